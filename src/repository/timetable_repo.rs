// ==========================================
// 学校排课系统 - 课表设置/约束仓储
// ==========================================
// 职责: 学校设置, 教师/班级/教室及其约束表的读写, 快照组装
// 红线: Repository 不含业务逻辑
// ==========================================

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::block::DistributionBlock;
use crate::domain::school::{Room, SchoolClass, SchoolSettings, Teacher};
use crate::domain::snapshot::ScheduleSnapshot;
use crate::domain::types::{EntityKind, SlotState, TimeSlot};
use crate::repository::error::{RepositoryError, RepositoryResult};

// ==========================================
// TimetableRepository - 课表设置仓储
// ==========================================
pub struct TimetableRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TimetableRepository {
    /// 创建新的 TimetableRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 学校设置
    // ==========================================

    /// 读取学校设置 (settings 行缺失时返回领域默认值)
    pub fn get_settings(&self) -> RepositoryResult<SchoolSettings> {
        let conn = self.get_conn()?;

        let row: Option<(u8, u8)> = conn
            .query_row(
                "SELECT max_days, max_hours FROM school_settings WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let mut settings = match row {
            Some((max_days, max_hours)) => SchoolSettings::new(max_days, max_hours),
            None => SchoolSettings::default(),
        };

        let mut stmt = conn.prepare("SELECT day, hour, state FROM default_timetable")?;
        let cells = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, u8>(0)?,
                    row.get::<_, u8>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<(u8, u8, String)>, _>>()?;

        for (day, hour, state) in cells {
            if let Some(state) = SlotState::from_str(&state) {
                settings
                    .default_timetable
                    .insert(TimeSlot::new(day, hour), state);
            }
        }

        Ok(settings)
    }

    /// 保存学校设置 (覆盖 settings 行与默认课表)
    pub fn save_settings(&self, settings: &SchoolSettings) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO school_settings (id, max_days, max_hours) VALUES (1, ?, ?)
               ON CONFLICT(id) DO UPDATE SET max_days = excluded.max_days,
                                             max_hours = excluded.max_hours"#,
            params![settings.max_days, settings.max_hours],
        )?;

        tx.execute("DELETE FROM default_timetable", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO default_timetable (day, hour, state) VALUES (?, ?, ?)")?;
            for (slot, state) in &settings.default_timetable {
                stmt.execute(params![slot.day, slot.hour, state.as_str()])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    // ==========================================
    // 实体写入 (含约束表, 用于播种与导入)
    // ==========================================

    /// 插入或更新教师 (含约束与单元格覆盖)
    pub fn upsert_teacher(&self, teacher: &Teacher) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO teacher (teacher_id, teacher_name, max_daily_hours, max_weekly_hours)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(teacher_id) DO UPDATE SET
                   teacher_name = excluded.teacher_name,
                   max_daily_hours = excluded.max_daily_hours,
                   max_weekly_hours = excluded.max_weekly_hours"#,
            params![
                &teacher.teacher_id,
                &teacher.teacher_name,
                &teacher.max_daily_hours,
                &teacher.max_weekly_hours,
            ],
        )?;

        Self::replace_constraints(
            &tx,
            EntityKind::Teacher,
            &teacher.teacher_id,
            &teacher.constraints,
        )?;
        Self::replace_overrides(
            &tx,
            EntityKind::Teacher,
            &teacher.teacher_id,
            &teacher.schedule_overrides,
        )?;

        tx.commit()?;
        Ok(())
    }

    /// 插入或更新班级 (含约束与单元格覆盖)
    pub fn upsert_class(&self, class: &SchoolClass) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO school_class (class_id, class_name) VALUES (?, ?)
               ON CONFLICT(class_id) DO UPDATE SET class_name = excluded.class_name"#,
            params![&class.class_id, &class.class_name],
        )?;

        Self::replace_constraints(&tx, EntityKind::Class, &class.class_id, &class.constraints)?;
        Self::replace_overrides(
            &tx,
            EntityKind::Class,
            &class.class_id,
            &class.schedule_overrides,
        )?;

        tx.commit()?;
        Ok(())
    }

    /// 插入或更新教室 (含约束)
    pub fn upsert_room(&self, room: &Room) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO room (room_id, room_name) VALUES (?, ?)
               ON CONFLICT(room_id) DO UPDATE SET room_name = excluded.room_name"#,
            params![&room.room_id, &room.room_name],
        )?;

        Self::replace_constraints(&tx, EntityKind::Room, &room.room_id, &room.constraints)?;

        tx.commit()?;
        Ok(())
    }

    fn replace_constraints(
        conn: &Connection,
        kind: EntityKind,
        entity_id: &str,
        constraints: &HashMap<TimeSlot, SlotState>,
    ) -> RepositoryResult<()> {
        conn.execute(
            "DELETE FROM entity_constraint WHERE entity_kind = ? AND entity_id = ?",
            params![kind.as_str(), entity_id],
        )?;
        let mut stmt = conn.prepare(
            "INSERT INTO entity_constraint (entity_kind, entity_id, day, hour, state) VALUES (?, ?, ?, ?, ?)",
        )?;
        for (slot, state) in constraints {
            stmt.execute(params![
                kind.as_str(),
                entity_id,
                slot.day,
                slot.hour,
                state.as_str()
            ])?;
        }
        Ok(())
    }

    fn replace_overrides(
        conn: &Connection,
        kind: EntityKind,
        entity_id: &str,
        overrides: &HashMap<String, SlotState>,
    ) -> RepositoryResult<()> {
        conn.execute(
            "DELETE FROM schedule_override WHERE entity_kind = ? AND entity_id = ?",
            params![kind.as_str(), entity_id],
        )?;
        let mut stmt = conn.prepare(
            "INSERT INTO schedule_override (entity_kind, entity_id, slot_key, state) VALUES (?, ?, ?, ?)",
        )?;
        for (slot_key, state) in overrides {
            stmt.execute(params![kind.as_str(), entity_id, slot_key, state.as_str()])?;
        }
        Ok(())
    }

    // ==========================================
    // 实体读取
    // ==========================================

    /// 读取全部教师 (含约束与单元格覆盖)
    pub fn load_teachers(&self) -> RepositoryResult<Vec<Teacher>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            "SELECT teacher_id, teacher_name, max_daily_hours, max_weekly_hours FROM teacher ORDER BY teacher_id",
        )?;
        let mut teachers = stmt
            .query_map([], |row| {
                Ok(Teacher {
                    teacher_id: row.get(0)?,
                    teacher_name: row.get(1)?,
                    constraints: HashMap::new(),
                    schedule_overrides: HashMap::new(),
                    max_daily_hours: row.get(2)?,
                    max_weekly_hours: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<Teacher>, _>>()?;

        let constraints = Self::load_constraint_maps(&conn, EntityKind::Teacher)?;
        let overrides = Self::load_override_maps(&conn, EntityKind::Teacher)?;
        for teacher in &mut teachers {
            if let Some(map) = constraints.get(&teacher.teacher_id) {
                teacher.constraints = map.clone();
            }
            if let Some(map) = overrides.get(&teacher.teacher_id) {
                teacher.schedule_overrides = map.clone();
            }
        }

        Ok(teachers)
    }

    /// 读取全部班级 (含约束与单元格覆盖)
    pub fn load_classes(&self) -> RepositoryResult<Vec<SchoolClass>> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare("SELECT class_id, class_name FROM school_class ORDER BY class_id")?;
        let mut classes = stmt
            .query_map([], |row| {
                Ok(SchoolClass {
                    class_id: row.get(0)?,
                    class_name: row.get(1)?,
                    constraints: HashMap::new(),
                    schedule_overrides: HashMap::new(),
                })
            })?
            .collect::<Result<Vec<SchoolClass>, _>>()?;

        let constraints = Self::load_constraint_maps(&conn, EntityKind::Class)?;
        let overrides = Self::load_override_maps(&conn, EntityKind::Class)?;
        for class in &mut classes {
            if let Some(map) = constraints.get(&class.class_id) {
                class.constraints = map.clone();
            }
            if let Some(map) = overrides.get(&class.class_id) {
                class.schedule_overrides = map.clone();
            }
        }

        Ok(classes)
    }

    /// 读取全部教室 (含约束)
    pub fn load_rooms(&self) -> RepositoryResult<Vec<Room>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare("SELECT room_id, room_name FROM room ORDER BY room_id")?;
        let mut rooms = stmt
            .query_map([], |row| {
                Ok(Room {
                    room_id: row.get(0)?,
                    room_name: row.get(1)?,
                    constraints: HashMap::new(),
                })
            })?
            .collect::<Result<Vec<Room>, _>>()?;

        let constraints = Self::load_constraint_maps(&conn, EntityKind::Room)?;
        for room in &mut rooms {
            if let Some(map) = constraints.get(&room.room_id) {
                room.constraints = map.clone();
            }
        }

        Ok(rooms)
    }

    fn load_constraint_maps(
        conn: &Connection,
        kind: EntityKind,
    ) -> RepositoryResult<HashMap<String, HashMap<TimeSlot, SlotState>>> {
        let mut stmt = conn.prepare(
            "SELECT entity_id, day, hour, state FROM entity_constraint WHERE entity_kind = ?",
        )?;
        let rows = stmt
            .query_map(params![kind.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u8>(1)?,
                    row.get::<_, u8>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<(String, u8, u8, String)>, _>>()?;

        let mut maps: HashMap<String, HashMap<TimeSlot, SlotState>> = HashMap::new();
        for (entity_id, day, hour, state) in rows {
            if let Some(state) = SlotState::from_str(&state) {
                maps.entry(entity_id)
                    .or_default()
                    .insert(TimeSlot::new(day, hour), state);
            }
        }
        Ok(maps)
    }

    fn load_override_maps(
        conn: &Connection,
        kind: EntityKind,
    ) -> RepositoryResult<HashMap<String, HashMap<String, SlotState>>> {
        let mut stmt = conn.prepare(
            "SELECT entity_id, slot_key, state FROM schedule_override WHERE entity_kind = ?",
        )?;
        let rows = stmt
            .query_map(params![kind.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<(String, String, String)>, _>>()?;

        let mut maps: HashMap<String, HashMap<String, SlotState>> = HashMap::new();
        for (entity_id, slot_key, state) in rows {
            if let Some(state) = SlotState::from_str(&state) {
                maps.entry(entity_id).or_default().insert(slot_key, state);
            }
        }
        Ok(maps)
    }

    // ==========================================
    // 快照组装
    // ==========================================

    /// 组装只读课表快照 (教学块由 BlockRepository 提供)
    pub fn load_snapshot(
        &self,
        blocks: Vec<DistributionBlock>,
    ) -> RepositoryResult<ScheduleSnapshot> {
        let settings = self.get_settings()?;
        let mut snapshot = ScheduleSnapshot::new(settings);

        for teacher in self.load_teachers()? {
            snapshot.teachers.insert(teacher.teacher_id.clone(), teacher);
        }
        for class in self.load_classes()? {
            snapshot.classes.insert(class.class_id.clone(), class);
        }
        for room in self.load_rooms()? {
            snapshot.rooms.insert(room.room_id.clone(), room);
        }
        for block in blocks {
            snapshot.blocks.insert(block.block_id.clone(), block);
        }

        Ok(snapshot)
    }
}
