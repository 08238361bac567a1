use super::*;

#[test]
fn test_record_get() {
    let rec = Record::new()
        .push("city", "Krakow")
        .push("country", "Poland")
        .push("city", "Warsaw");

    assert_eq!(rec.len(), 3);
    assert!(!rec.is_empty());
    // first occurrence wins.
    assert_eq!(rec.get("city"), Some(&Scalar::from("Krakow")));
    assert_eq!(rec.get("country"), Some(&Scalar::from("Poland")));
    assert_eq!(rec.get("continent"), None);
}

#[test]
fn test_record_project() {
    let rec = Record::new()
        .push("city", "Krakow")
        .push("country", "Poland")
        .push("pop", 800_000_i64);

    let names = vec!["country".to_string(), "city".to_string()];
    let sub = rec.project(&names).unwrap();
    let expect = Record::new().push("country", "Poland").push("city", "Krakow");
    assert_eq!(sub, expect);

    let names = vec!["continent".to_string()];
    assert!(rec.project(&names).is_err());
}

#[test]
fn test_record_bytes() {
    let a = Record::new().push("x", 1_i64).push("y", 2_i64);
    let b = Record::new().push("y", 2_i64).push("x", 1_i64);

    let data = a.to_bytes().unwrap();
    assert_eq!(Record::from_bytes(&data).unwrap(), a);
    // field order is part of the canonical representation.
    assert_ne!(b.to_bytes().unwrap(), data);
}

#[test]
fn test_record_footprint() {
    let rec = Record::new().push("city", "Krakow").push("pop", 800_000_i64);
    assert!(rec.footprint().unwrap() > 0);
}
