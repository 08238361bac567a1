use super::*;
use crate::{
    mri::{results, Config},
    tss::Store,
};

fn res(hash: u64, data: &[u8]) -> MapResult {
    MapResult { hash, data: data.to_vec() }
}

#[test]
fn test_map_document() {
    let store = Store::new("test-writer");
    let config = Config::new("idx");
    let ledger = Ledger::new("idx");
    let seq = IdSeq::new("idx");

    // initial emission, two results in two buckets.
    let mut results_store = ResultsStore::new(&config);
    let mut txn = store.begin().unwrap();
    let fresh = vec![res(0xa, b"p1"), res(0xb, b"p2")];
    let n = map_document(&mut txn, &ledger, &mut results_store, &seq, b"doc", fresh).unwrap();
    assert_eq!(n, 2);
    let entries = vec![MapEntry::new(1, 0xa), MapEntry::new(2, 0xb)];
    assert_eq!(ledger.load(&txn, b"doc").unwrap(), entries);
    txn.commit();

    // identical re-emission, ids stable, no fresh allocations.
    let mut results_store = ResultsStore::new(&config);
    let mut txn = store.begin().unwrap();
    let fresh = vec![res(0xa, b"p1"), res(0xb, b"p2")];
    let n = map_document(&mut txn, &ledger, &mut results_store, &seq, b"doc", fresh).unwrap();
    assert_eq!(n, 2);
    assert_eq!(ledger.load(&txn, b"doc").unwrap(), entries);
    assert_eq!(seq.load(&txn).unwrap(), 2);
    txn.commit();

    // payload changed within the same bucket, id stays.
    let mut results_store = ResultsStore::new(&config);
    let mut txn = store.begin().unwrap();
    let fresh = vec![res(0xa, b"p1x"), res(0xb, b"p2")];
    map_document(&mut txn, &ledger, &mut results_store, &seq, b"doc", fresh).unwrap();
    assert_eq!(ledger.load(&txn, b"doc").unwrap(), entries);
    assert_eq!(seq.load(&txn).unwrap(), 2);
    assert_eq!(results_store.get(&txn, 0xa, 1).unwrap(), Some(b"p1x".to_vec()));
    txn.commit();

    // first result moved buckets, its id is retired.
    let mut results_store = ResultsStore::new(&config);
    let mut txn = store.begin().unwrap();
    let fresh = vec![res(0xc, b"p1x"), res(0xb, b"p2")];
    map_document(&mut txn, &ledger, &mut results_store, &seq, b"doc", fresh).unwrap();
    let entries = vec![MapEntry::new(3, 0xc), MapEntry::new(2, 0xb)];
    assert_eq!(ledger.load(&txn, b"doc").unwrap(), entries);
    assert_eq!(seq.load(&txn).unwrap(), 3);
    assert_eq!(results_store.get(&txn, 0xa, 1).unwrap(), None);
    assert_eq!(results_store.get(&txn, 0xc, 3).unwrap(), Some(b"p1x".to_vec()));
    txn.commit();

    // emission shrank, surplus results are dropped.
    let mut results_store = ResultsStore::new(&config);
    let mut txn = store.begin().unwrap();
    let fresh = vec![res(0xc, b"p1x")];
    let n = map_document(&mut txn, &ledger, &mut results_store, &seq, b"doc", fresh).unwrap();
    assert_eq!(n, 1);
    assert_eq!(ledger.load(&txn, b"doc").unwrap(), vec![MapEntry::new(3, 0xc)]);
    assert_eq!(results_store.get(&txn, 0xb, 2).unwrap(), None);
    txn.commit();

    // empty emission removes the document from the index.
    let mut results_store = ResultsStore::new(&config);
    let mut txn = store.begin().unwrap();
    let n = map_document(&mut txn, &ledger, &mut results_store, &seq, b"doc", vec![]).unwrap();
    assert_eq!(n, 0);
    assert_eq!(ledger.load(&txn, b"doc").unwrap(), vec![]);
    assert_eq!(results_store.get(&txn, 0xc, 3).unwrap(), None);
    txn.commit();

    let snap = store.snapshot();
    for hash in [0xa_u64, 0xb, 0xc].iter() {
        assert!(results::read_bucket(&snap, "idx", *hash).unwrap().is_empty());
    }
}

#[test]
fn test_delete_document() {
    let store = Store::new("test-writer-delete");
    let config = Config::new("idx");
    let ledger = Ledger::new("idx");
    let seq = IdSeq::new("idx");

    let mut results_store = ResultsStore::new(&config);
    let mut txn = store.begin().unwrap();
    let fresh = vec![res(0xa, b"p1"), res(0xa, b"p2")];
    map_document(&mut txn, &ledger, &mut results_store, &seq, b"doc", fresh).unwrap();
    txn.commit();

    let mut results_store = ResultsStore::new(&config);
    let mut txn = store.begin().unwrap();
    delete_document(&mut txn, &ledger, &mut results_store, b"doc").unwrap();
    assert_eq!(ledger.load(&txn, b"doc").unwrap(), vec![]);
    txn.commit();

    let snap = store.snapshot();
    assert!(results::read_bucket(&snap, "idx", 0xa).unwrap().is_empty());
    // ids are never re-used, the watermark survives the delete.
    assert_eq!(crate::mri::ledger::read_seq(&snap, "idx").unwrap(), 2);
}

#[test]
fn test_broken_bijection() {
    let store = Store::new("test-writer-broken");
    let config = Config::new("idx");
    let ledger = Ledger::new("idx");
    let seq = IdSeq::new("idx");

    let mut results_store = ResultsStore::new(&config);
    let mut txn = store.begin().unwrap();
    // ledger claims an id that no bucket holds.
    ledger.replace(&mut txn, b"doc", vec![MapEntry::new(9, 0xa)]).unwrap();

    let fresh = vec![res(0xa, b"p1")];
    let res = map_document(&mut txn, &ledger, &mut results_store, &seq, b"doc", fresh);
    match res {
        Err(Error::Corruption(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
}
