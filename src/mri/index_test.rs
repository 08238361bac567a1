use std::sync::atomic::Ordering;

use super::*;
use crate::dbs::Scalar;

fn sales_defn() -> IndexDefn {
    IndexDefn::new()
        .add_field("Location", FieldOp::None)
        .add_field("Count", FieldOp::Count)
        .add_field("Total", FieldOp::Sum(NumericKind::Integer))
}

fn sale(loc: &str, total: i64) -> Record {
    Record::new()
        .push("Location", loc)
        .push("Count", 1_i64)
        .push("Total", total)
}

fn aggregate_all(index: &Index) -> Vec<Record> {
    let mut recs = vec![];
    for hash in index.list_buckets().unwrap().into_iter() {
        recs.extend(index.aggregate(hash).unwrap());
    }
    recs
}

#[test]
fn test_validate_defn() {
    assert!(IndexDefn::new().validate().is_err());

    // no group-by field.
    let defn = IndexDefn::new().add_field("Count", FieldOp::Count);
    assert!(defn.validate().is_err());

    // no aggregated field.
    let defn = IndexDefn::new().add_field("Location", FieldOp::None);
    assert!(defn.validate().is_err());

    // duplicate field name.
    let defn = sales_defn().add_field("Count", FieldOp::Count);
    assert!(defn.validate().is_err());

    sales_defn().validate().unwrap();
    assert_eq!(sales_defn().group_by(), vec!["Location".to_string()]);
}

#[test]
fn test_create_open() {
    let store = Store::new("db");

    let index = Index::create(&store, Config::new("sales"), sales_defn()).unwrap();
    assert_eq!(index.to_name(), "sales".to_string());

    // name is taken.
    match Index::create(&store, Config::new("sales"), sales_defn()).err() {
        Some(Error::InvalidInput(_, _)) => (),
        err => panic!("unexpected {:?}", err),
    }
    // bad definition never lands in the store.
    assert!(Index::create(&store, Config::new("empty"), IndexDefn::new()).is_err());
    match Index::open(&store, "empty").err() {
        Some(Error::KeyNotFound(_, _)) => (),
        err => panic!("unexpected {:?}", err),
    }

    let mut config = Config::new("tuned");
    config.set_nested_limit(2).set_nested_cap(128);
    Index::create(&store, config, sales_defn()).unwrap();

    let index = Index::open(&store, "tuned").unwrap();
    assert_eq!(index.as_defn(), &sales_defn());
    assert_eq!(index.to_config().nested_limit, 2);
    assert_eq!(index.to_config().nested_cap, 128);

    let index = Index::open(&store, "sales").unwrap();
    assert_eq!(index.to_config().nested_limit, crate::mri::NESTED_LIMIT);
    index.close().unwrap();
}

#[test]
fn test_indexing() {
    let store = Store::new("db");
    let index = Index::create(&store, Config::new("sales"), sales_defn()).unwrap();

    let mut batch = index.begin_batch().unwrap();
    let n = batch.map_document(b"d1", vec![sale("Poland", 10), sale("Poland", 5)]).unwrap();
    assert_eq!(n, 2);
    batch.map_document(b"d2", vec![sale("Poland", 1), sale("Germany", 7)]).unwrap();
    batch.commit().unwrap();

    let buckets = index.list_buckets().unwrap();
    assert_eq!(buckets.len(), 2);

    let recs = aggregate_all(&index);
    assert_eq!(recs.len(), 2);
    for rec in recs.iter() {
        match rec.get("Location").unwrap() {
            Scalar::T { value } if value == "Poland" => {
                assert_eq!(rec.get("Count"), Some(&Scalar::from(3_i64)));
                assert_eq!(rec.get("Total"), Some(&Scalar::from(16_i64)));
            }
            Scalar::T { value } if value == "Germany" => {
                assert_eq!(rec.get("Count"), Some(&Scalar::from(1_i64)));
                assert_eq!(rec.get("Total"), Some(&Scalar::from(7_i64)));
            }
            val => panic!("unexpected group {}", val),
        }
    }
    index.validate().unwrap();

    // re-mapping unchanged documents is a no-op, ids included.
    let watermark = index.to_stats().unwrap().id_watermark;
    let mut batch = index.begin_batch().unwrap();
    batch.map_document(b"d1", vec![sale("Poland", 10), sale("Poland", 5)]).unwrap();
    batch.map_document(b"d2", vec![sale("Poland", 1), sale("Germany", 7)]).unwrap();
    batch.commit().unwrap();

    assert_eq!(index.to_stats().unwrap().id_watermark, watermark);
    assert_eq!(aggregate_all(&index), recs);
    index.validate().unwrap();
}

#[test]
fn test_positional_diff() {
    let store = Store::new("db");
    let index = Index::create(&store, Config::new("sales"), sales_defn()).unwrap();

    let mut batch = index.begin_batch().unwrap();
    batch.map_document(b"d1", vec![sale("Poland", 10)]).unwrap();
    batch.commit().unwrap();
    assert_eq!(index.to_stats().unwrap().id_watermark, 1);

    // value change within the same group re-uses the id.
    let mut batch = index.begin_batch().unwrap();
    batch.map_document(b"d1", vec![sale("Poland", 20)]).unwrap();
    batch.commit().unwrap();
    assert_eq!(index.to_stats().unwrap().id_watermark, 1);

    let recs = aggregate_all(&index);
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].get("Total"), Some(&Scalar::from(20_i64)));

    // group change allocates a fresh id and empties the old bucket.
    let mut batch = index.begin_batch().unwrap();
    batch.map_document(b"d1", vec![sale("Germany", 20)]).unwrap();
    batch.commit().unwrap();
    assert_eq!(index.to_stats().unwrap().id_watermark, 2);
    assert_eq!(index.list_buckets().unwrap().len(), 2);

    let recs = aggregate_all(&index);
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].get("Location"), Some(&Scalar::from("Germany")));
    index.validate().unwrap();

    // tombstone drops everything but the watermark.
    let mut batch = index.begin_batch().unwrap();
    batch.delete_document(b"d1").unwrap();
    batch.commit().unwrap();

    let stats = index.to_stats().unwrap();
    assert_eq!(stats.n_documents, 0);
    assert_eq!(stats.n_entries, 0);
    assert_eq!(stats.id_watermark, 2);
    assert!(aggregate_all(&index).is_empty());
    index.validate().unwrap();
}

#[test]
fn test_promotion() {
    let store = Store::new("db");
    let mut config = Config::new("sales");
    config.set_nested_limit(2).set_nested_cap(4096);
    let index = Index::create(&store, config, sales_defn()).unwrap();

    let mut batch = index.begin_batch().unwrap();
    for i in 0..5_i64 {
        let doc_key = format!("d{}", i);
        batch.map_document(doc_key.as_bytes(), vec![sale("Poland", i)]).unwrap();
    }
    batch.map_document(b"dx", vec![sale("Germany", 1)]).unwrap();
    batch.commit().unwrap();

    let stats = index.to_stats().unwrap();
    assert_eq!(stats.n_documents, 6);
    assert_eq!(stats.n_entries, 6);
    assert_eq!(stats.n_tree_buckets, 1);
    assert_eq!(stats.n_nested_buckets, 1);

    let recs = aggregate_all(&index);
    assert_eq!(recs.len(), 2);
    index.validate().unwrap();
}

#[test]
fn test_batch_discard() {
    let store = Store::new("db");
    let index = Index::create(&store, Config::new("sales"), sales_defn()).unwrap();

    {
        let mut batch = index.begin_batch().unwrap();
        batch.map_document(b"d1", vec![sale("Poland", 10)]).unwrap();
        // dropped without commit.
    }

    let stats = index.to_stats().unwrap();
    assert_eq!(stats.n_documents, 0);
    assert_eq!(stats.id_watermark, 0);
    assert!(index.list_buckets().unwrap().is_empty());
}

#[test]
fn test_batch_survives_bad_document() {
    let store = Store::new("db");
    let index = Index::create(&store, Config::new("sales"), sales_defn()).unwrap();

    let mut batch = index.begin_batch().unwrap();
    // missing group-by field fails before the diff touches storage.
    let bad = Record::new().push("Total", 1_i64);
    assert!(batch.map_document(b"d1", vec![bad]).is_err());

    batch.map_document(b"d2", vec![sale("Poland", 10)]).unwrap();
    batch.commit().unwrap();

    let stats = index.to_stats().unwrap();
    assert_eq!(stats.n_documents, 1);
    assert_eq!(stats.n_entries, 1);
    assert_eq!(stats.id_watermark, 1);
    index.validate().unwrap();
}

#[test]
fn test_aggregate_buckets() {
    let store = Store::new("db");
    let index = Index::create(&store, Config::new("sales"), sales_defn()).unwrap();

    let mut batch = index.begin_batch().unwrap();
    batch.map_document(b"d1", vec![sale("Poland", 10), sale("Germany", 2)]).unwrap();
    batch.commit().unwrap();

    let buckets = index.list_buckets().unwrap();
    let cancel = Arc::new(AtomicBool::new(false));
    let recs = index.aggregate_buckets(&buckets, Arc::clone(&cancel)).unwrap();
    assert_eq!(recs.len(), 2);

    cancel.store(true, Ordering::Relaxed);
    match index.aggregate_buckets(&buckets, cancel) {
        Err(Error::Cancelled(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
}
