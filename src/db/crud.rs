use sqlx::{Result, SqlitePool};

use super::{LibraryRecord, PhotoRecord};

/// 添加照片库记录
pub async fn add_library(pool: &SqlitePool, library: &LibraryRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO library (id, name, path, created_at, last_indexed_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&library.id)
    .bind(&library.name)
    .bind(&library.path)
    .bind(library.created_at)
    .bind(library.last_indexed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// 按 ID 查找照片库
pub async fn get_library(pool: &SqlitePool, id: &str) -> Result<Option<LibraryRecord>> {
    sqlx::query_as(r#"SELECT * FROM library WHERE id = ?"#).bind(id).fetch_optional(pool).await
}

/// 按根目录查找照片库
pub async fn get_library_by_path(pool: &SqlitePool, path: &str) -> Result<Option<LibraryRecord>> {
    sqlx::query_as(r#"SELECT * FROM library WHERE path = ?"#).bind(path).fetch_optional(pool).await
}

/// 按 ID 或名称查找照片库
pub async fn find_library(pool: &SqlitePool, selector: &str) -> Result<Option<LibraryRecord>> {
    sqlx::query_as(r#"SELECT * FROM library WHERE id = ? OR name = ?"#)
        .bind(selector)
        .bind(selector)
        .fetch_optional(pool)
        .await
}

/// 列出所有照片库
pub async fn list_libraries(pool: &SqlitePool) -> Result<Vec<LibraryRecord>> {
    sqlx::query_as(r#"SELECT * FROM library ORDER BY created_at"#).fetch_all(pool).await
}

/// 更新照片库的最近索引时间
pub async fn set_last_indexed(pool: &SqlitePool, id: &str, timestamp: i64) -> Result<()> {
    sqlx::query(r#"UPDATE library SET last_indexed_at = ? WHERE id = ?"#)
        .bind(timestamp)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// 删除照片库及其全部照片记录
pub async fn delete_library(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query(r#"DELETE FROM library WHERE id = ?"#).bind(id).execute(pool).await?;

    Ok(())
}

/// 添加照片记录
pub async fn add_photo(pool: &SqlitePool, photo: &PhotoRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO photo (id, library_id, path, file_name, file_size, modified_at, embedding)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&photo.id)
    .bind(&photo.library_id)
    .bind(&photo.path)
    .bind(&photo.file_name)
    .bind(photo.file_size)
    .bind(photo.modified_at)
    .bind(&photo.embedding)
    .execute(pool)
    .await?;

    Ok(())
}

/// 按 ID 查找照片
pub async fn get_photo(pool: &SqlitePool, id: &str) -> Result<Option<PhotoRecord>> {
    sqlx::query_as(r#"SELECT * FROM photo WHERE id = ?"#).bind(id).fetch_optional(pool).await
}

/// 按路径查找照片
pub async fn find_photo_by_path(
    pool: &SqlitePool,
    library_id: &str,
    path: &str,
) -> Result<Option<PhotoRecord>> {
    sqlx::query_as(r#"SELECT * FROM photo WHERE library_id = ? AND path = ?"#)
        .bind(library_id)
        .bind(path)
        .fetch_optional(pool)
        .await
}

/// 更新照片的嵌入向量
pub async fn set_embedding(pool: &SqlitePool, photo_id: &str, embedding: &[u8]) -> Result<()> {
    sqlx::query(r#"UPDATE photo SET embedding = ? WHERE id = ?"#)
        .bind(embedding)
        .bind(photo_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// 删除照片记录
pub async fn delete_photo(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query(r#"DELETE FROM photo WHERE id = ?"#).bind(id).execute(pool).await?;

    Ok(())
}

/// 清空照片库的全部照片记录
pub async fn clear_photos(pool: &SqlitePool, library_id: &str) -> Result<()> {
    sqlx::query(r#"DELETE FROM photo WHERE library_id = ?"#)
        .bind(library_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// 列出照片库中所有已编码的照片
pub async fn embedded_photos(pool: &SqlitePool, library_id: &str) -> Result<Vec<PhotoRecord>> {
    sqlx::query_as(
        r#"SELECT * FROM photo WHERE library_id = ? AND embedding IS NOT NULL ORDER BY path"#,
    )
    .bind(library_id)
    .fetch_all(pool)
    .await
}

/// 照片库中的照片总数
pub async fn count_photos(pool: &SqlitePool, library_id: &str) -> Result<i64> {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM photo WHERE library_id = ?"#)
        .bind(library_id)
        .fetch_one(pool)
        .await
}

/// 照片库中已编码的照片数量
pub async fn count_embedded(pool: &SqlitePool, library_id: &str) -> Result<i64> {
    sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM photo WHERE library_id = ? AND embedding IS NOT NULL"#,
    )
    .bind(library_id)
    .fetch_one(pool)
    .await
}
