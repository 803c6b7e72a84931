// src/watch/filter.rs

//! Classification of raw filesystem events.
//!
//! Everything here is a pure function: no state, no IO.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::{Path, PathBuf};

use notify::EventKind;
use notify::event::ModifyKind;

/// Bitmask of filesystem operations carried by an event.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Op(u8);

impl Op {
    pub const NONE: Op = Op(0);
    pub const CREATE: Op = Op(1 << 0);
    pub const WRITE: Op = Op(1 << 1);
    pub const REMOVE: Op = Op(1 << 2);
    pub const RENAME: Op = Op(1 << 3);
    pub const CHMOD: Op = Op(1 << 4);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn intersects(self, other: Op) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains(self, other: Op) -> bool {
        self.0 & other.0 == other.0
    }

    /// Map a `notify` event kind onto the operation mask.
    pub fn from_event_kind(kind: &EventKind) -> Op {
        match kind {
            EventKind::Create(_) => Op::CREATE,
            EventKind::Remove(_) => Op::REMOVE,
            EventKind::Modify(ModifyKind::Metadata(_)) => Op::CHMOD,
            EventKind::Modify(ModifyKind::Name(_)) => Op::RENAME,
            EventKind::Modify(_) => Op::WRITE,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Op::NONE,
        }
    }
}

impl BitOr for Op {
    type Output = Op;

    fn bitor(self, rhs: Op) -> Op {
        Op(self.0 | rhs.0)
    }
}

impl BitOrAssign for Op {
    fn bitor_assign(&mut self, rhs: Op) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Op, &str); 5] = [
            (Op::CREATE, "CREATE"),
            (Op::WRITE, "WRITE"),
            (Op::REMOVE, "REMOVE"),
            (Op::RENAME, "RENAME"),
            (Op::CHMOD, "CHMOD"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(op, _)| self.contains(*op))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("NONE")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// A single path touched by a filesystem event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub op: Op,
}

impl FsEvent {
    pub fn new(path: impl Into<PathBuf>, op: Op) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }

    /// Split a `notify` event into one `FsEvent` per path.
    pub fn from_notify(event: &notify::Event) -> Vec<FsEvent> {
        let op = Op::from_event_kind(&event.kind);
        event.paths.iter().map(|p| FsEvent::new(p.clone(), op)).collect()
    }
}

/// Directory names never descended into.
pub const IGNORED_DIRS: &[&str] = &[".git", "node_modules", ".vscode", ".idea", ".DS_Store", "vendor"];

/// One row of the ignored-file table. Empty strings and `Op::NONE` mean
/// "no constraint".
#[derive(Debug, Clone, Copy)]
pub struct IgnorePattern {
    pub exact: &'static str,
    pub prefix: &'static str,
    pub suffix: &'static str,
    pub op: Op,
}

impl IgnorePattern {
    const fn new(exact: &'static str, prefix: &'static str, suffix: &'static str, op: Op) -> Self {
        Self {
            exact,
            prefix,
            suffix,
            op,
        }
    }

    pub fn matches(&self, name: &str, op: Op) -> bool {
        if !self.exact.is_empty() && name != self.exact {
            return false;
        }
        if !self.prefix.is_empty() && !name.starts_with(self.prefix) {
            return false;
        }
        if !self.suffix.is_empty() && !name.ends_with(self.suffix) {
            return false;
        }
        self.op.is_empty() || self.op.intersects(op)
    }
}

/// Editor swap/backup/lock files and toolchain temp files.
pub const IGNORED_FILE_PATTERNS: &[IgnorePattern] = &[
    // Emacs/vim backups
    IgnorePattern::new("", "", "~", Op::NONE),
    // Vim swap files
    IgnorePattern::new("", ".", ".swp", Op::NONE),
    IgnorePattern::new("", ".", ".swx", Op::NONE),
    // Deno bundler temp files
    IgnorePattern::new("", "___", "___", Op::NONE),
    IgnorePattern::new("", "___", "", Op::NONE),
    IgnorePattern::new("", "", ".tmp", Op::NONE),
    // Emacs lock files
    IgnorePattern::new("", ".#", "", Op::NONE),
    // Atomic writes touch the mode bits of `name___` before the rename.
    IgnorePattern::new("", "", "___", Op::CHMOD),
];

/// Whether a directory should be skipped when walking or watching.
///
/// `current_path` equal to `root` is never ignored, even when it is
/// dot-prefixed.
pub fn is_ignored_dir(dir_basename: &str, root: &Path, current_path: &Path) -> bool {
    if current_path == root {
        return false;
    }
    if IGNORED_DIRS.contains(&dir_basename) {
        return true;
    }
    dir_basename.starts_with('.') && dir_basename != "." && dir_basename != ".."
}

/// Whether an event on a file named `event_name` is editor or toolchain noise.
///
/// Only the basename of `event_name` is inspected.
pub fn is_ignored_file_event(event_name: &str, op: Op) -> bool {
    let name = Path::new(event_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(event_name);
    IGNORED_FILE_PATTERNS.iter().any(|p| p.matches(name, op))
}

/// Write, create, remove and rename are significant; chmod and access are not.
pub fn is_significant(event: &FsEvent) -> bool {
    event
        .op
        .intersects(Op::WRITE | Op::CREATE | Op::REMOVE | Op::RENAME)
}
