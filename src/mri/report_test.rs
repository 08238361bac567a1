use super::*;
use crate::{
    dbs::Record,
    mri::{FieldOp, Index, IndexDefn},
    tss::Store,
};

fn visit(loc: &str) -> Record {
    Record::new().push("Location", loc).push("Count", 1_i64)
}

#[test]
fn test_stats() {
    let store = Store::new("db");
    let mut config = Config::new("visits");
    config.set_nested_limit(2).set_nested_cap(4096);
    let defn = IndexDefn::new()
        .add_field("Location", FieldOp::None)
        .add_field("Count", FieldOp::Count);
    let index = Index::create(&store, config, defn).unwrap();

    let stats = index.to_stats().unwrap();
    assert_eq!(stats.name, "visits".to_string());
    assert_eq!(stats.n_documents, 0);
    assert_eq!(stats.n_entries, 0);
    assert_eq!(stats.id_watermark, 0);

    // three results in one bucket promote it, one stays nested.
    let mut batch = index.begin_batch().unwrap();
    for i in 0..3_usize {
        let doc_key = format!("d{}", i);
        batch.map_document(doc_key.as_bytes(), vec![visit("Poland")]).unwrap();
    }
    batch.map_document(b"dx", vec![visit("Germany")]).unwrap();
    batch.commit().unwrap();

    let stats = index.to_stats().unwrap();
    assert_eq!(stats.n_documents, 4);
    assert_eq!(stats.n_entries, 4);
    assert_eq!(stats.n_nested_buckets, 1);
    assert_eq!(stats.n_tree_buckets, 1);
    assert!(stats.nested_footprint > 0);
    assert!(stats.tree_footprint > 0);
    assert_eq!(stats.id_watermark, 4);

    println!("test_stats\n{}", stats);
}
