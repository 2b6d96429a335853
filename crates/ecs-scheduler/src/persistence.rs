//! Persistence hooks.
//!
//! Grounded on the teacher's `nomai-ecs::snapshot` (`WorldSnapshot`,
//! `capture_snapshot`/`restore_snapshot`), but kept at the abstraction level
//! this scheduler's contract actually calls for: the core never chooses a
//! file format or a serialization crate. A host implements [`SaveProfile`]/
//! [`LoadProfile`] over whatever encoding it likes (JSON, bincode, a flat
//! file per system) and hands the orchestrator one writer/reader per system,
//! keyed by [`System::name`]; [`System::save_state`]/`load_state` only ever
//! see the primitive-typed methods below.

/// Sink for one system's serialized state.
pub trait SaveWriter {
    fn write_i32(&mut self, value: i32);
    fn write_i64(&mut self, value: i64);
    fn write_u32(&mut self, value: u32);
    fn write_u64(&mut self, value: u64);
    fn write_f32(&mut self, value: f32);
    fn write_f64(&mut self, value: f64);
    fn write_bool(&mut self, value: bool);
    fn write_str(&mut self, value: &str);
    fn write_bytes(&mut self, value: &[u8]);
}

/// Source for one system's serialized state, read back in the same order
/// it was written.
pub trait SaveReader {
    fn read_i32(&mut self) -> i32;
    fn read_i64(&mut self) -> i64;
    fn read_u32(&mut self) -> u32;
    fn read_u64(&mut self) -> u64;
    fn read_f32(&mut self) -> f32;
    fn read_f64(&mut self) -> f64;
    fn read_bool(&mut self) -> bool;
    fn read_str(&mut self) -> String;
    fn read_bytes(&mut self) -> Vec<u8>;
}

/// Hands out one [`SaveWriter`] per system name during a save pass.
pub trait SaveProfile {
    fn writer(&mut self, system_name: &str) -> &mut dyn SaveWriter;
}

/// Hands out one [`SaveReader`] per system name during a load pass.
pub trait LoadProfile {
    fn reader(&mut self, system_name: &str) -> &mut dyn SaveReader;
}

#[cfg(test)]
pub(crate) mod test_support {
    //! An in-memory profile, used only by this crate's own tests to exercise
    //! `save_state`/`load_state` round trips without pulling in a real codec.
    use super::*;
    use rustc_hash::FxHashMap;

    #[derive(Default)]
    pub struct MemoryWriter {
        pub i32s: Vec<i32>,
        pub strs: Vec<String>,
    }

    impl SaveWriter for MemoryWriter {
        fn write_i32(&mut self, value: i32) {
            self.i32s.push(value);
        }
        fn write_i64(&mut self, _value: i64) {}
        fn write_u32(&mut self, _value: u32) {}
        fn write_u64(&mut self, _value: u64) {}
        fn write_f32(&mut self, _value: f32) {}
        fn write_f64(&mut self, _value: f64) {}
        fn write_bool(&mut self, _value: bool) {}
        fn write_str(&mut self, value: &str) {
            self.strs.push(value.to_string());
        }
        fn write_bytes(&mut self, _value: &[u8]) {}
    }

    #[derive(Default)]
    pub struct MemoryReader {
        pub i32s: std::collections::VecDeque<i32>,
    }

    impl SaveReader for MemoryReader {
        fn read_i32(&mut self) -> i32 {
            self.i32s.pop_front().unwrap_or_default()
        }
        fn read_i64(&mut self) -> i64 {
            0
        }
        fn read_u32(&mut self) -> u32 {
            0
        }
        fn read_u64(&mut self) -> u64 {
            0
        }
        fn read_f32(&mut self) -> f32 {
            0.0
        }
        fn read_f64(&mut self) -> f64 {
            0.0
        }
        fn read_bool(&mut self) -> bool {
            false
        }
        fn read_str(&mut self) -> String {
            String::new()
        }
        fn read_bytes(&mut self) -> Vec<u8> {
            Vec::new()
        }
    }

    #[derive(Default)]
    pub struct MemoryProfile {
        pub writers: FxHashMap<String, MemoryWriter>,
        pub readers: FxHashMap<String, MemoryReader>,
    }

    impl SaveProfile for MemoryProfile {
        fn writer(&mut self, system_name: &str) -> &mut dyn SaveWriter {
            self.writers.entry(system_name.to_string()).or_default()
        }
    }

    impl LoadProfile for MemoryProfile {
        fn reader(&mut self, system_name: &str) -> &mut dyn SaveReader {
            self.readers.entry(system_name.to_string()).or_default()
        }
    }
}
