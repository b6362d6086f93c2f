//! Inode-number bookkeeping for the path-keyed core.
//!
//! The kernel speaks inode numbers; the federation speaks absolute logical
//! paths. This table owns the translation: inos are handed out on first
//! lookup and retired when the kernel's lookup count drains via `forget`.

use std::collections::HashMap;

pub const ROOT_INO: u64 = 1;

struct PathEntry {
    path: String,
    lookups: u64,
}

pub struct PathTable {
    by_ino: HashMap<u64, PathEntry>,
    by_path: HashMap<String, u64>,
    next_ino: u64,
}

impl PathTable {
    pub fn new() -> Self {
        let mut table = PathTable {
            by_ino: HashMap::new(),
            by_path: HashMap::new(),
            next_ino: 2,
        };
        table.by_ino.insert(
            ROOT_INO,
            PathEntry {
                path: "/".to_string(),
                lookups: 1,
            },
        );
        table.by_path.insert("/".to_string(), ROOT_INO);
        table
    }

    pub fn path_of(&self, ino: u64) -> Option<&str> {
        self.by_ino.get(&ino).map(|e| e.path.as_str())
    }

    pub fn ino_of(&self, path: &str) -> Option<u64> {
        self.by_path.get(path).copied()
    }

    /// The ino bound to `path`, allocating one on first sight.
    pub fn intern(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.by_path.get(path) {
            return ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.by_ino.insert(
            ino,
            PathEntry {
                path: path.to_string(),
                lookups: 0,
            },
        );
        self.by_path.insert(path.to_string(), ino);
        ino
    }

    /// Record one kernel lookup reference against `ino`.
    pub fn remember_lookup(&mut self, ino: u64) {
        if let Some(entry) = self.by_ino.get_mut(&ino) {
            entry.lookups += 1;
        }
    }

    /// Drain `n` lookup references; the entry is dropped at zero.
    pub fn forget(&mut self, ino: u64, n: u64) {
        if ino == ROOT_INO {
            return;
        }
        let drained = match self.by_ino.get_mut(&ino) {
            Some(entry) => {
                entry.lookups = entry.lookups.saturating_sub(n);
                entry.lookups == 0
            }
            None => false,
        };
        if drained {
            if let Some(entry) = self.by_ino.remove(&ino) {
                if self.by_path.get(&entry.path) == Some(&ino) {
                    self.by_path.remove(&entry.path);
                }
            }
        }
    }

    /// Drop the path binding after an unlink. The ino stays resolvable for
    /// the kernel until its lookups are forgotten.
    pub fn unbind(&mut self, path: &str) {
        self.by_path.remove(path);
    }

    /// Re-key a binding after a rename; a clobbered target binding is
    /// dropped (its ino lingers until forgotten).
    pub fn rebind(&mut self, from: &str, to: &str) {
        if let Some(ino) = self.by_path.remove(from) {
            self.by_path.insert(to.to_string(), ino);
            if let Some(entry) = self.by_ino.get_mut(&ino) {
                entry.path = to.to_string();
            }
        }
    }

    /// Swap two bindings after an exchange rename.
    pub fn exchange(&mut self, a: &str, b: &str) {
        let ia = self.by_path.remove(a);
        let ib = self.by_path.remove(b);
        if let Some(ino) = ia {
            self.by_path.insert(b.to_string(), ino);
            if let Some(entry) = self.by_ino.get_mut(&ino) {
                entry.path = b.to_string();
            }
        }
        if let Some(ino) = ib {
            self.by_path.insert(a.to_string(), ino);
            if let Some(entry) = self.by_ino.get_mut(&ino) {
                entry.path = a.to_string();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_ino.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ino.is_empty()
    }
}

impl Default for PathTable {
    fn default() -> Self {
        Self::new()
    }
}
