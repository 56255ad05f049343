use std::fs;
use std::path::Path;
use std::sync::Arc;

use indicatif::ProgressBar;
use picsearch::config::ConfDir;
use picsearch::db::{self, Database, LibraryRecord, crud};
use picsearch::encoder::{Encoder, StubEncoder};
use picsearch::hnsw::HnswParams;
use picsearch::indexer::Indexer;
use picsearch::library::LibraryIndexManager;
use picsearch::searcher::Searcher;
use picsearch::utils::unix_millis;
use tempfile::TempDir;
use uuid::Uuid;

const DIM: usize = 32;

struct Fixture {
    _tmp: TempDir,
    conf: ConfDir,
    db: Database,
    library: LibraryRecord,
    encoder: Arc<Encoder>,
}

/// 准备一个带照片目录和数据库的测试环境
///
/// 目录里有三张可编码的"照片"、一个无关的文本文件和一张空文件
/// （内置编码器对空文件报错，模拟单张照片编码失败）
async fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let photos = tmp.path().join("photos");
    fs::create_dir(&photos).unwrap();
    fs::write(photos.join("cat.jpg"), b"a cat sitting on the sofa").unwrap();
    fs::write(photos.join("beach.png"), b"sunset at the beach").unwrap();
    fs::write(photos.join("city.webp"), b"a city skyline at night").unwrap();
    fs::write(photos.join("notes.txt"), b"not a photo").unwrap();
    fs::write(photos.join("broken.jpg"), b"").unwrap();

    let conf_path = tmp.path().join("conf");
    fs::create_dir(&conf_path).unwrap();
    let conf: ConfDir = conf_path.to_str().unwrap().parse().unwrap();
    let db = db::init_db(conf.database()).await.unwrap();

    let library = LibraryRecord {
        id: Uuid::new_v4().to_string(),
        name: "test".to_string(),
        path: photos.to_string_lossy().to_string(),
        created_at: unix_millis(),
        last_indexed_at: None,
    };
    crud::add_library(&db, &library).await.unwrap();

    let encoder = Arc::new(Encoder::Stub(StubEncoder::new(DIM)));
    Fixture { _tmp: tmp, conf, db, library, encoder }
}

fn make_manager(f: &Fixture) -> Arc<LibraryIndexManager> {
    let library_id = Uuid::parse_str(&f.library.id).unwrap();
    Arc::new(LibraryIndexManager::new(&f.conf, library_id, DIM, HnswParams::default()))
}

async fn run_index(f: &Fixture) -> (Arc<LibraryIndexManager>, picsearch::indexer::IndexReport) {
    let manager = make_manager(f);
    let indexer = Indexer::new(f.db.clone(), f.encoder.clone(), manager.clone());
    let report =
        indexer.index_library(&f.library, "jpg,png,webp", &ProgressBar::hidden()).await.unwrap();
    (manager, report)
}

#[tokio::test]
async fn index_library_builds_searchable_index() {
    let f = fixture().await;
    let (manager, report) = run_index(&f).await;

    // txt 被过滤；空 jpg 编码失败但不中止任务
    assert_eq!(report.scanned, 4);
    assert_eq!(report.encoded, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.indexed, 3);
    assert!(!report.cancelled);

    assert_eq!(crud::count_photos(&f.db, &f.library.id).await.unwrap(), 4);
    assert_eq!(crud::count_embedded(&f.db, &f.library.id).await.unwrap(), 3);
    assert!(manager.index_exists());
    assert_eq!(manager.current_count().await, 3);

    // 编码失败的照片入库但没有嵌入
    let broken = crud::find_photo_by_path(
        &f.db,
        &f.library.id,
        &Path::new(&f.library.path).join("broken.jpg").to_string_lossy(),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(broken.embedding.is_none());

    // 用某张照片自身的向量查询，应返回这张照片且相似度接近 1
    let query = f
        .encoder
        .encode_image(&Path::new(&f.library.path).join("cat.jpg"))
        .await
        .unwrap();
    let results = manager.search(&query, 1, 0.0).await.unwrap();
    assert_eq!(results.len(), 1);
    let cat = crud::get_photo(&f.db, &results[0].photo_id.to_string()).await.unwrap().unwrap();
    assert!(cat.path.ends_with("cat.jpg"));
    assert!(results[0].similarity > 0.999);
}

#[tokio::test]
async fn reindex_replaces_previous_state() {
    let f = fixture().await;
    run_index(&f).await;
    let (manager, report) = run_index(&f).await;

    assert_eq!(report.scanned, 4);
    assert_eq!(crud::count_photos(&f.db, &f.library.id).await.unwrap(), 4);
    assert_eq!(manager.current_count().await, 3);
}

#[tokio::test]
async fn brute_force_agrees_with_ann() {
    let f = fixture().await;
    let (manager, _) = run_index(&f).await;

    let query = f.encoder.encode_text("sunset at the beach").await.unwrap();
    let searcher = Searcher::new(f.db.clone(), f.encoder.clone(), manager.clone()).with_threshold(0.0);

    let brute = searcher.brute_force(&query, 3).await.unwrap();
    let ann = manager.search(&query, 3, 0.0).await.unwrap();

    assert!(!brute.is_empty());
    assert!(!ann.is_empty());
    // 线性扫描是精确结果，ANN 的第一名不会比它好
    assert!(brute[0].similarity >= ann[0].similarity - 1e-3);
    assert_eq!(brute[0].photo_id, ann[0].photo_id);
}

#[tokio::test]
async fn search_falls_back_without_index() {
    let f = fixture().await;
    let (manager, _) = run_index(&f).await;

    // 删除索引文件并换一个空白管理器，搜索应回退到线性扫描
    let library_id = Uuid::parse_str(&f.library.id).unwrap();
    fs::remove_file(f.conf.index_file(&library_id)).unwrap();
    fs::remove_file(f.conf.mapping_file(&library_id)).unwrap();
    drop(manager);

    let fresh = make_manager(&f);
    // 阈值取 -1 以便不相关的照片也能进入结果
    let searcher = Searcher::new(f.db.clone(), f.encoder.clone(), fresh).with_threshold(-1.0);
    let query = f.encoder.encode_text("a city skyline at night").await.unwrap();
    let results = searcher.search_vector(&query, 3).await.unwrap();

    assert_eq!(results.len(), 3);
    // 降序排列
    for pair in results.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[tokio::test]
async fn cancelled_run_leaves_no_index() {
    let f = fixture().await;
    let manager = make_manager(&f);
    let indexer = Indexer::new(f.db.clone(), f.encoder.clone(), manager.clone());
    indexer.cancel_flag().cancel();

    let report =
        indexer.index_library(&f.library, "jpg,png,webp", &ProgressBar::hidden()).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.encoded, 0);
    assert!(!manager.index_exists());
}
