use super::*;
use crate::dbs::Record;

#[test]
fn test_reduce_codec() {
    let group_by = vec!["country".to_string(), "city".to_string()];
    let mut codec = ReduceCodec::new(group_by.clone());
    assert_eq!(codec.as_group_by(), group_by.as_slice());

    let a = Record::new()
        .push("country", "Poland")
        .push("city", "Krakow")
        .push("pop", 800_000_i64);
    // same group-by values, different order and extras.
    let b = Record::new()
        .push("city", "Krakow")
        .push("pop", 10_i64)
        .push("country", "Poland");
    let c = Record::new().push("country", "Poland").push("city", "Warsaw");

    let (ha, ka) = codec.build(&a).unwrap();
    let (hb, kb) = codec.build(&b).unwrap();
    let (hc, kc) = codec.build(&c).unwrap();

    assert_eq!(ha, hb);
    assert_eq!(ka, kb);
    assert_ne!(ka, kc);
    assert_ne!(ha, hc);

    // digest is stable across resets.
    codec.reset();
    assert_eq!(codec.build(&a).unwrap(), (ha, ka));
}

#[test]
fn test_missing_group_by() {
    let mut codec = ReduceCodec::new(vec!["country".to_string(), "city".to_string()]);

    let rec = Record::new().push("country", "Poland");
    assert!(codec.build(&rec).is_err());
}
