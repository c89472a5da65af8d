// ==========================================
// 学校排课系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为, 避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout, 减少并发写入时的偶发 busy 错误
// - 提供幂等建表入口, 供测试与嵌入方引导空库
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout (毫秒)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 仅用于提示/告警 (不做自动迁移), 避免静默在旧库上运行导致隐性错误
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明:
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version (若表不存在则返回 None)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等建表 (CREATE TABLE IF NOT EXISTS)
///
/// 说明:
/// - school_settings 兜底播种 (5天×10节), 嵌入方可随后覆盖
/// - slot_occupancy 为派生信号表, 由 BlockRepository::sync_derived_tables 重建
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER NOT NULL,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS school_settings (
            id        INTEGER PRIMARY KEY CHECK (id = 1),
            max_days  INTEGER NOT NULL,
            max_hours INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS default_timetable (
            day   INTEGER NOT NULL,
            hour  INTEGER NOT NULL,
            state TEXT NOT NULL,
            PRIMARY KEY (day, hour)
        );

        CREATE TABLE IF NOT EXISTS teacher (
            teacher_id       TEXT PRIMARY KEY,
            teacher_name     TEXT NOT NULL,
            max_daily_hours  INTEGER,
            max_weekly_hours INTEGER
        );

        CREATE TABLE IF NOT EXISTS school_class (
            class_id   TEXT PRIMARY KEY,
            class_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS room (
            room_id   TEXT PRIMARY KEY,
            room_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS entity_constraint (
            entity_kind TEXT NOT NULL,
            entity_id   TEXT NOT NULL,
            day         INTEGER NOT NULL,
            hour        INTEGER NOT NULL,
            state       TEXT NOT NULL,
            PRIMARY KEY (entity_kind, entity_id, day, hour)
        );

        CREATE TABLE IF NOT EXISTS schedule_override (
            entity_kind TEXT NOT NULL,
            entity_id   TEXT NOT NULL,
            slot_key    TEXT NOT NULL,
            state       TEXT NOT NULL,
            PRIMARY KEY (entity_kind, entity_id, slot_key)
        );

        CREATE TABLE IF NOT EXISTS distribution_block (
            block_id         TEXT PRIMARY KEY,
            class_id         TEXT NOT NULL REFERENCES school_class(class_id),
            lesson_code      TEXT NOT NULL,
            room_id          TEXT REFERENCES room(room_id),
            day              INTEGER,
            hour             INTEGER,
            duration         INTEGER NOT NULL DEFAULT 1,
            is_locked        INTEGER NOT NULL DEFAULT 0,
            is_placed        INTEGER NOT NULL DEFAULT 0,
            placement_source TEXT NOT NULL DEFAULT 'CALC',
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS block_teacher (
            block_id   TEXT NOT NULL REFERENCES distribution_block(block_id) ON DELETE CASCADE,
            teacher_id TEXT NOT NULL REFERENCES teacher(teacher_id),
            PRIMARY KEY (block_id, teacher_id)
        );

        CREATE TABLE IF NOT EXISTS slot_occupancy (
            entity_kind TEXT NOT NULL,
            entity_id   TEXT NOT NULL,
            day         INTEGER NOT NULL,
            hour        INTEGER NOT NULL,
            block_id    TEXT NOT NULL REFERENCES distribution_block(block_id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_slot_occupancy_cell
            ON slot_occupancy (entity_kind, entity_id, day, hour);

        CREATE TABLE IF NOT EXISTS action_log (
            action_id    TEXT PRIMARY KEY,
            action_type  TEXT NOT NULL,
            block_id     TEXT,
            payload_json TEXT,
            detail       TEXT,
            action_ts    TEXT NOT NULL,
            actor        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key      TEXT NOT NULL,
            value    TEXT NOT NULL,
            PRIMARY KEY (scope_id, key)
        );

        INSERT OR IGNORE INTO school_settings (id, max_days, max_hours) VALUES (1, 5, 10);

        INSERT INTO schema_version (version, applied_at)
        SELECT 1, datetime('now')
        WHERE NOT EXISTS (SELECT 1 FROM schema_version WHERE version = 1);
        "#,
    )?;
    Ok(())
}
