use picsearch::config::ConfDir;
use picsearch::hnsw::{HnswParams, IndexError};
use picsearch::library::LibraryIndexManager;
use rand::prelude::*;
use tempfile::TempDir;
use uuid::Uuid;

const DIM: usize = 8;

fn conf(tmp: &TempDir) -> ConfDir {
    tmp.path().to_str().unwrap().parse().unwrap()
}

fn manager(tmp: &TempDir) -> LibraryIndexManager {
    manager_for(tmp, Uuid::new_v4())
}

fn manager_for(tmp: &TempDir, library_id: Uuid) -> LibraryIndexManager {
    LibraryIndexManager::new(&conf(tmp), library_id, DIM, HnswParams::default())
}

/// 第 i 维为 1 的单位向量
fn unit(i: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[i] = 1.0;
    v
}

/// 与 unit(i) 方向接近但不完全相同的向量
fn near(i: usize) -> Vec<f32> {
    let mut v = vec![0.01; DIM];
    v[i] = 1.0;
    v
}

#[tokio::test]
async fn search_returns_nearest_neighbor() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(&tmp);
    manager.initialize_index(100).await.unwrap();

    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    manager.add_item(&unit(0), a).await.unwrap();
    manager.add_item(&unit(1), b).await.unwrap();
    manager.add_item(&unit(2), c).await.unwrap();

    let results = manager.search(&near(1), 1, 0.0).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].photo_id, b);
    assert!(results[0].similarity > 0.95);
}

#[tokio::test]
async fn remove_item_excludes_from_search() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(&tmp);
    manager.initialize_index(100).await.unwrap();

    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    manager.add_item(&unit(0), a).await.unwrap();
    manager.add_item(&unit(1), b).await.unwrap();
    manager.add_item(&unit(2), c).await.unwrap();

    manager.remove_item(b).await.unwrap();

    let results = manager.search(&near(1), 3, 0.0).await.unwrap();
    assert!(results.iter().all(|r| r.photo_id != b));
    assert_eq!(manager.current_count().await, 2);

    // 再删一次是静默跳过
    manager.remove_item(b).await.unwrap();
    assert_eq!(manager.current_count().await, 2);
}

#[tokio::test]
async fn empty_index_returns_empty() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(&tmp);
    manager.initialize_index(100).await.unwrap();

    let results = manager.search(&unit(0), 5, 0.0).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn uninitialized_operations_fail() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(&tmp);

    let err = manager.add_item(&unit(0), Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, IndexError::NotInitialized));

    let err = manager.search(&unit(0), 1, 0.0).await.unwrap_err();
    assert!(matches!(err, IndexError::NotInitialized));

    let err = manager.save().await.unwrap_err();
    assert!(matches!(err, IndexError::NotInitialized));
}

#[tokio::test]
async fn dimension_mismatch_mutates_nothing() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(&tmp);
    manager.initialize_index(100).await.unwrap();

    let err = manager.add_item(&[1.0, 0.0], Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, IndexError::DimensionMismatch { expected: DIM, got: 2 }));
    assert_eq!(manager.current_count().await, 0);

    let err = manager.search(&[1.0, 0.0, 0.0], 1, 0.0).await.unwrap_err();
    assert!(matches!(err, IndexError::DimensionMismatch { expected: DIM, got: 3 }));

    // 出错后索引仍然可用
    manager.add_item(&unit(0), Uuid::new_v4()).await.unwrap();
    assert_eq!(manager.current_count().await, 1);
}

#[tokio::test]
async fn replace_keeps_single_binding() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(&tmp);
    manager.initialize_index(100).await.unwrap();

    let id = Uuid::new_v4();
    manager.add_item(&unit(0), id).await.unwrap();
    manager.add_item(&unit(3), id).await.unwrap();

    assert_eq!(manager.current_count().await, 1);

    // 旧向量不可达，新向量可达
    let results = manager.search(&unit(0), 3, 0.9).await.unwrap();
    assert!(results.iter().all(|r| r.photo_id != id));
    let results = manager.search(&unit(3), 1, 0.9).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].photo_id, id);
}

#[tokio::test]
async fn batch_argument_validation() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(&tmp);
    manager.initialize_index(100).await.unwrap();

    let err = manager
        .add_items(&[unit(0), unit(1)], &[Uuid::new_v4()])
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::InvalidArgument(_)));

    // 单个坏向量中止整批，不产生部分写入
    let err = manager
        .add_items(&[unit(0), vec![1.0, 0.0]], &[Uuid::new_v4(), Uuid::new_v4()])
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    assert_eq!(manager.current_count().await, 0);
}

#[tokio::test]
async fn batch_add_and_search() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(&tmp);
    manager.initialize_index(100).await.unwrap();

    let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    let embeddings: Vec<Vec<f32>> = (0..4).map(unit).collect();
    manager.add_items(&embeddings, &ids).await.unwrap();
    assert_eq!(manager.current_count().await, 4);

    let results = manager.search_batch(&[near(0), near(2)], 1, 0.0).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0][0].photo_id, ids[0]);
    assert_eq!(results[1][0].photo_id, ids[2]);
}

#[tokio::test]
async fn save_load_reproduces_results() {
    let tmp = TempDir::new().unwrap();
    let library_id = Uuid::new_v4();
    let manager = manager_for(&tmp, library_id);
    manager.initialize_index(100).await.unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let mut vectors = vec![];
    for _ in 0..20 {
        let v: Vec<f32> = (0..DIM).map(|_| rng.random::<f32>() - 0.5).collect();
        let id = Uuid::new_v4();
        manager.add_item(&v, id).await.unwrap();
        vectors.push(v);
    }
    manager.save().await.unwrap();
    assert!(manager.index_exists());

    let restored = manager_for(&tmp, library_id);
    restored.load().await.unwrap();
    assert_eq!(restored.current_count().await, 20);

    for query in vectors.iter().take(5) {
        let before = manager.search(query, 10, 0.0).await.unwrap();
        let after = restored.search(query, 10, 0.0).await.unwrap();
        assert_eq!(before.len(), after.len());
        for (x, y) in before.iter().zip(&after) {
            assert_eq!(x.photo_id, y.photo_id);
            assert!((x.similarity - y.similarity).abs() < 1e-5);
        }
    }
}

#[tokio::test]
async fn load_refuses_partial_state() {
    let tmp = TempDir::new().unwrap();
    let library_id = Uuid::new_v4();
    let manager = manager_for(&tmp, library_id);

    // 没有任何文件
    assert!(!manager.index_exists());
    let err = manager.load().await.unwrap_err();
    assert!(matches!(err, IndexError::Load(_)));

    // 只有索引文件没有映射文件同样失败
    manager.initialize_index(10).await.unwrap();
    manager.add_item(&unit(0), Uuid::new_v4()).await.unwrap();
    manager.save().await.unwrap();
    std::fs::remove_file(conf(&tmp).mapping_file(&library_id)).unwrap();

    let restored = manager_for(&tmp, library_id);
    let err = restored.load().await.unwrap_err();
    assert!(matches!(err, IndexError::Load(_)));
}

#[tokio::test]
async fn threshold_only_removes_results() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(&tmp);
    manager.initialize_index(100).await.unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..30 {
        let v: Vec<f32> = (0..DIM).map(|_| rng.random::<f32>()).collect();
        manager.add_item(&v, Uuid::new_v4()).await.unwrap();
    }

    let query: Vec<f32> = (0..DIM).map(|_| rng.random::<f32>()).collect();
    let loose = manager.search(&query, 30, 0.0).await.unwrap();
    let strict = manager.search(&query, 30, 0.8).await.unwrap();

    let loose_ids: Vec<_> = loose.iter().map(|r| r.photo_id).collect();
    for r in &strict {
        assert!(r.similarity >= 0.8);
        assert!(loose_ids.contains(&r.photo_id));
    }
    assert!(strict.len() <= loose.len());
}

#[tokio::test]
async fn capacity_grows_automatically() {
    let tmp = TempDir::new().unwrap();
    let manager = manager(&tmp);
    manager.initialize_index(2).await.unwrap();

    for i in 0..10 {
        manager.add_item(&near(i % DIM), Uuid::new_v4()).await.unwrap();
    }
    assert_eq!(manager.current_count().await, 10);

    let err = manager.resize(1).await.unwrap_err();
    assert!(matches!(err, IndexError::Resize(_)));
    manager.resize(64).await.unwrap();
}

#[tokio::test]
async fn clear_removes_files_and_state() {
    let tmp = TempDir::new().unwrap();
    let library_id = Uuid::new_v4();
    let manager = manager_for(&tmp, library_id);
    manager.initialize_index(10).await.unwrap();
    manager.add_item(&unit(0), Uuid::new_v4()).await.unwrap();
    manager.save().await.unwrap();
    assert!(manager.index_exists());

    manager.clear().await.unwrap();
    assert!(!manager.index_exists());
    assert_eq!(manager.current_count().await, 0);
    assert!(!manager.is_loaded().await);
}
