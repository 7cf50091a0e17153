// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Unix permission bits: an owner/group/other x read/write/execute matrix
//! plus the setuid, setgid and sticky flags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{KernelError, KernelResult};
use crate::types::{Gid, ROOT_UID, Uid};

/// Kind of access being requested
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
    Execute,
}

impl Access {
    fn column(self) -> usize {
        match self {
            Access::Read => 0,
            Access::Write => 1,
            Access::Execute => 2,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => write!(f, "read"),
            Access::Write => write!(f, "write"),
            Access::Execute => write!(f, "execute"),
        }
    }
}

/// Which row of the matrix applies to a caller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Class {
    Owner,
    Group,
    Other,
}

impl Class {
    const ALL: [Class; 3] = [Class::Owner, Class::Group, Class::Other];

    fn row(self) -> usize {
        match self {
            Class::Owner => 0,
            Class::Group => 1,
            Class::Other => 2,
        }
    }

    /// Pick the row for `uid`/`groups` against an inode owned by `owner_uid:owner_gid`.
    pub fn for_caller(uid: Uid, groups: &[Gid], owner_uid: Uid, owner_gid: Gid) -> Class {
        if uid == owner_uid {
            Class::Owner
        } else if groups.contains(&owner_gid) {
            Class::Group
        } else {
            Class::Other
        }
    }
}

const SETUID: u32 = 0o4000;
const SETGID: u32 = 0o2000;
const STICKY: u32 = 0o1000;

/// Immutable permission value; equality is by content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Permissions {
    bits: [[bool; 3]; 3],
    setuid: bool,
    setgid: bool,
    sticky: bool,
}

impl Permissions {
    /// Build from standard Unix mode bits. Bits above 0o7777 are ignored.
    pub fn from_mode(mode: u32) -> Self {
        let mut bits = [[false; 3]; 3];
        for (row, class_bits) in bits.iter_mut().enumerate() {
            let shift = 6 - 3 * row as u32;
            let triple = (mode >> shift) & 0o7;
            class_bits[0] = triple & 0o4 != 0;
            class_bits[1] = triple & 0o2 != 0;
            class_bits[2] = triple & 0o1 != 0;
        }
        Self {
            bits,
            setuid: mode & SETUID != 0,
            setgid: mode & SETGID != 0,
            sticky: mode & STICKY != 0,
        }
    }

    pub fn to_mode(&self) -> u32 {
        let mut mode = 0;
        for (row, class_bits) in self.bits.iter().enumerate() {
            let shift = 6 - 3 * row as u32;
            let triple = (class_bits[0] as u32) << 2
                | (class_bits[1] as u32) << 1
                | class_bits[2] as u32;
            mode |= triple << shift;
        }
        if self.setuid {
            mode |= SETUID;
        }
        if self.setgid {
            mode |= SETGID;
        }
        if self.sticky {
            mode |= STICKY;
        }
        mode
    }

    pub fn allows(&self, class: Class, access: Access) -> bool {
        self.bits[class.row()][access.column()]
    }

    /// Check `access` for a caller with a single group id.
    pub fn check(&self, access: Access, uid: Uid, gid: Gid, owner_uid: Uid, owner_gid: Gid) -> bool {
        self.check_with_groups(access, uid, &[gid], owner_uid, owner_gid)
    }

    /// Check `access` for a caller belonging to every gid in `groups`.
    ///
    /// uid 0 always passes. Otherwise exactly one row is consulted: owner,
    /// then group, then other. An owner without the owner bit is denied even
    /// when the other bits would allow it.
    pub fn check_with_groups(
        &self,
        access: Access,
        uid: Uid,
        groups: &[Gid],
        owner_uid: Uid,
        owner_gid: Gid,
    ) -> bool {
        if uid == ROOT_UID {
            return true;
        }
        self.allows(Class::for_caller(uid, groups, owner_uid, owner_gid), access)
    }

    pub fn setuid(&self) -> bool {
        self.setuid
    }

    pub fn setgid(&self) -> bool {
        self.setgid
    }

    pub fn sticky(&self) -> bool {
        self.sticky
    }

    /// True when any class may execute.
    pub fn any_execute(&self) -> bool {
        Class::ALL.iter().any(|class| self.allows(*class, Access::Execute))
    }

    pub fn with(mut self, class: Class, access: Access, value: bool) -> Self {
        self.bits[class.row()][access.column()] = value;
        self
    }

    pub fn with_setuid(mut self, value: bool) -> Self {
        self.setuid = value;
        self
    }

    pub fn with_setgid(mut self, value: bool) -> Self {
        self.setgid = value;
        self
    }

    pub fn with_sticky(mut self, value: bool) -> Self {
        self.sticky = value;
        self
    }

    /// Interpret a `chmod` mode argument: octal (`755`, `4755`) or symbolic
    /// (`u+x`, `go-w`, `+r,o-x`), applied on top of `current`.
    pub fn parse_chmod(arg: &str, current: Permissions) -> KernelResult<Permissions> {
        if !arg.is_empty() && arg.chars().all(|c| c.is_digit(8)) {
            let mode = u32::from_str_radix(arg, 8)
                .map_err(|_| KernelError::invalid(format!("invalid mode: '{}'", arg)))?;
            if mode > 0o7777 {
                return Err(KernelError::invalid(format!("invalid mode: '{}'", arg)));
            }
            return Ok(Permissions::from_mode(mode));
        }
        let symbolic: SymbolicMode = arg.parse()?;
        Ok(symbolic.apply(current))
    }
}

impl From<u32> for Permissions {
    fn from(mode: u32) -> Self {
        Permissions::from_mode(mode)
    }
}

impl From<Permissions> for u32 {
    fn from(perms: Permissions) -> Self {
        perms.to_mode()
    }
}

const LETTERS: [char; 3] = ['r', 'w', 'x'];

impl FromStr for Permissions {
    type Err = KernelError;

    /// Parse the 9-character `ls -l` form, e.g. `rwxr-x---` or `rwsr-xr-t`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 9 {
            return Err(KernelError::invalid(format!(
                "permission string must have 9 characters: '{}'",
                s
            )));
        }
        let mut perms = Permissions::default();
        for (i, c) in chars.iter().enumerate() {
            let row = i / 3;
            let col = i % 3;
            let class = Class::ALL[row];
            let access = [Access::Read, Access::Write, Access::Execute][col];
            if col == 2 {
                // execute column doubles as the special-bit slot
                let (set, special) = match (row, *c) {
                    (_, 'x') => (true, false),
                    (0 | 1, 's') | (2, 't') => (true, true),
                    (0 | 1, 'S') | (2, 'T') => (false, true),
                    _ => (false, false),
                };
                perms = perms.with(class, access, set);
                if special {
                    perms = match row {
                        0 => perms.with_setuid(true),
                        1 => perms.with_setgid(true),
                        _ => perms.with_sticky(true),
                    };
                }
            } else {
                perms = perms.with(class, access, *c == LETTERS[col]);
            }
        }
        Ok(perms)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let specials = [
            (self.setuid, 's'),
            (self.setgid, 's'),
            (self.sticky, 't'),
        ];
        let mut out = String::with_capacity(9);
        for (row, class_bits) in self.bits.iter().enumerate() {
            out.push(if class_bits[0] { 'r' } else { '-' });
            out.push(if class_bits[1] { 'w' } else { '-' });
            let (special, letter) = specials[row];
            out.push(match (class_bits[2], special) {
                (true, false) => 'x',
                (false, false) => '-',
                (true, true) => letter,
                (false, true) => letter.to_ascii_uppercase(),
            });
        }
        f.write_str(&out)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Add,
    Remove,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Clause {
    classes: Vec<Class>,
    op: Op,
    accesses: Vec<Access>,
}

/// Symbolic mode mutation such as `u+x`, `go-rw` or `+x,o-w`.
///
/// A clause without classes applies to all three classes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolicMode {
    clauses: Vec<Clause>,
}

impl SymbolicMode {
    pub fn apply(&self, mut perms: Permissions) -> Permissions {
        for clause in &self.clauses {
            for class in &clause.classes {
                for access in &clause.accesses {
                    perms = perms.with(*class, *access, clause.op == Op::Add);
                }
            }
        }
        perms
    }
}

impl FromStr for SymbolicMode {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || KernelError::invalid(format!("invalid mode: '{}'", s));
        let mut clauses = Vec::new();
        for part in s.split(',') {
            let op_at = part.find(|c| c == '+' || c == '-').ok_or_else(invalid)?;
            let (who, rest) = part.split_at(op_at);
            let op = if rest.starts_with('+') { Op::Add } else { Op::Remove };

            let mut classes = Vec::new();
            for c in who.chars() {
                let picked: &[Class] = match c {
                    'u' => &[Class::Owner],
                    'g' => &[Class::Group],
                    'o' => &[Class::Other],
                    'a' => &Class::ALL,
                    _ => return Err(invalid()),
                };
                for class in picked {
                    if !classes.contains(class) {
                        classes.push(*class);
                    }
                }
            }
            if classes.is_empty() {
                classes.extend_from_slice(&Class::ALL);
            }

            let mut accesses = Vec::new();
            for c in rest[1..].chars() {
                let access = match c {
                    'r' => Access::Read,
                    'w' => Access::Write,
                    'x' => Access::Execute,
                    _ => return Err(invalid()),
                };
                if !accesses.contains(&access) {
                    accesses.push(access);
                }
            }
            if accesses.is_empty() {
                return Err(invalid());
            }
            clauses.push(Clause {
                classes,
                op,
                accesses,
            });
        }
        Ok(SymbolicMode { clauses })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_conversion() {
        let perms = Permissions::from_mode(0o754);
        assert!(perms.allows(Class::Owner, Access::Read));
        assert!(perms.allows(Class::Owner, Access::Write));
        assert!(perms.allows(Class::Owner, Access::Execute));
        assert!(perms.allows(Class::Group, Access::Read));
        assert!(!perms.allows(Class::Group, Access::Write));
        assert!(perms.allows(Class::Group, Access::Execute));
        assert!(perms.allows(Class::Other, Access::Read));
        assert!(!perms.allows(Class::Other, Access::Execute));
        assert_eq!(perms.to_mode(), 0o754);

        let special = Permissions::from_mode(0o4755);
        assert!(special.setuid());
        assert!(!special.setgid());
        assert_eq!(special.to_mode(), 0o4755);
        assert_eq!(Permissions::from_mode(0o1777).to_string(), "rwxrwxrwt");
    }

    #[test]
    fn test_symbolic_string() {
        let perms: Permissions = "rwxr-x---".parse().expect("valid string");
        assert_eq!(perms, Permissions::from_mode(0o750));
        assert_eq!(perms.to_string(), "rwxr-x---");

        let suid: Permissions = "rwsr-xr-x".parse().expect("valid string");
        assert_eq!(suid.to_mode(), 0o4755);
        assert_eq!(Permissions::from_mode(0o4644).to_string(), "rwSr--r--");

        assert!("rwx".parse::<Permissions>().is_err());
    }

    #[test]
    fn test_root_always_passes() {
        let none = Permissions::from_mode(0o000);
        for access in [Access::Read, Access::Write, Access::Execute] {
            assert!(none.check(access, 0, 0, 1000, 1000));
        }
    }

    #[test]
    fn test_write_truth_table() {
        let (owner_uid, owner_gid) = (1000, 100);
        let callers = [
            (1000, 100), // owner, in group
            (1000, 5),   // owner, not in group
            (2000, 100), // group member
            (2000, 5),   // other
            (0, 5),      // root
        ];
        for mode in 0..0o1000u32 {
            let perms = Permissions::from_mode(mode);
            let owner_w = mode & 0o200 != 0;
            let group_w = mode & 0o020 != 0;
            let other_w = mode & 0o002 != 0;
            for (uid, gid) in callers {
                let expected = if uid == 0 {
                    true
                } else if uid == owner_uid {
                    owner_w
                } else if gid == owner_gid {
                    group_w
                } else {
                    other_w
                };
                assert_eq!(
                    perms.check(Access::Write, uid, gid, owner_uid, owner_gid),
                    expected,
                    "mode {:o} uid {} gid {}",
                    mode,
                    uid,
                    gid
                );
            }
        }
    }

    #[test]
    fn test_owner_row_is_exclusive() {
        // owner lacks read but others have it: owner is still denied
        let perms = Permissions::from_mode(0o044);
        assert!(!perms.check(Access::Read, 1000, 1000, 1000, 1000));
        assert!(perms.check(Access::Read, 1001, 1001, 1000, 1000));
    }

    #[test]
    fn test_group_membership_list() {
        let perms = Permissions::from_mode(0o070);
        assert!(perms.check_with_groups(Access::Write, 1001, &[1001, 27], 1000, 27));
        assert!(!perms.check_with_groups(Access::Write, 1001, &[1001], 1000, 27));
    }

    #[test]
    fn test_symbolic_without_class_applies_to_all() {
        let mode: SymbolicMode = "+x".parse().expect("valid mode");
        assert_eq!(mode.apply(Permissions::from_mode(0o644)).to_mode(), 0o755);

        let mode: SymbolicMode = "-r".parse().expect("valid mode");
        assert_eq!(mode.apply(Permissions::from_mode(0o644)).to_mode(), 0o200);
    }

    #[test]
    fn test_symbolic_classes() {
        let mode: SymbolicMode = "go-w,u+x".parse().expect("valid mode");
        assert_eq!(mode.apply(Permissions::from_mode(0o666)).to_mode(), 0o744);

        let mode: SymbolicMode = "a+rwx".parse().expect("valid mode");
        assert_eq!(mode.apply(Permissions::from_mode(0)).to_mode(), 0o777);

        assert!("u*x".parse::<SymbolicMode>().is_err());
        assert!("z+x".parse::<SymbolicMode>().is_err());
        assert!("u+".parse::<SymbolicMode>().is_err());
    }

    #[test]
    fn test_symbolic_keeps_special_bits() {
        let mode: SymbolicMode = "o-x".parse().expect("valid mode");
        assert_eq!(mode.apply(Permissions::from_mode(0o4755)).to_mode(), 0o4754);
    }

    #[test]
    fn test_parse_chmod() {
        let current = Permissions::from_mode(0o600);
        assert_eq!(
            Permissions::parse_chmod("755", current).expect("octal").to_mode(),
            0o755
        );
        assert_eq!(
            Permissions::parse_chmod("g+r", current).expect("symbolic").to_mode(),
            0o640
        );
        assert!(Permissions::parse_chmod("77777", current).is_err());
        assert!(Permissions::parse_chmod("", current).is_err());
    }
}
