// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Users, groups and their `/etc/passwd`, `/etc/shadow`, `/etc/group`
//! renderings.
//!
//! Password hashes are unsalted BLAKE3 hex digests. They are meant to be
//! crackable inside the game.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{KernelError, KernelResult};
use crate::types::{Gid, ROOT_GID, ROOT_UID, Uid};

/// First uid/gid handed out to regular accounts
pub const FIRST_REGULAR_ID: u32 = 1000;

pub fn hash_password(password: &str) -> String {
    blake3::hash(password.as_bytes()).to_hex().to_string()
}

/// GECOS fields, all optional
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub full_name: Option<String>,
    pub room_number: Option<String>,
    pub work_phone: Option<String>,
    pub home_phone: Option<String>,
    pub other: Option<String>,
}

impl Profile {
    fn to_gecos(&self) -> String {
        let fields = [
            &self.full_name,
            &self.room_number,
            &self.work_phone,
            &self.home_phone,
            &self.other,
        ];
        let rendered: Vec<&str> = fields.iter().map(|f| f.as_deref().unwrap_or("")).collect();
        let joined = rendered.join(",");
        joined.trim_end_matches(',').to_string()
    }

    fn from_gecos(gecos: &str) -> Self {
        let mut parts = gecos.split(',').map(|s| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        });
        Self {
            full_name: parts.next().flatten(),
            room_number: parts.next().flatten(),
            work_phone: parts.next().flatten(),
            home_phone: parts.next().flatten(),
            other: parts.next().flatten(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: Uid,
    pub username: String,
    /// `None` when the account has no password
    pub password: Option<String>,
    /// Primary group
    pub gid: Gid,
    pub home: String,
    pub shell: String,
    pub profile: Profile,
    /// Supplementary group memberships
    pub groups: BTreeSet<Gid>,
}

impl User {
    pub fn set_password(&mut self, password: Option<&str>) {
        self.password = password.filter(|p| !p.is_empty()).map(hash_password);
    }

    pub fn check_password(&self, password: &str) -> bool {
        match &self.password {
            Some(hash) => *hash == hash_password(password),
            None => password.is_empty(),
        }
    }

    /// Primary plus supplementary gids
    pub fn all_groups(&self) -> Vec<Gid> {
        std::iter::once(self.gid)
            .chain(self.groups.iter().copied().filter(|gid| *gid != self.gid))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub gid: Gid,
    pub name: String,
}

/// Account database backing `/etc/passwd`, `/etc/shadow` and `/etc/group`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserDb {
    users: BTreeMap<Uid, User>,
    groups: BTreeMap<Gid, Group>,
}

impl UserDb {
    /// Database holding `root` (uid 0, home `/root`) and its group.
    pub fn with_root(root_password: &str) -> Self {
        let mut db = Self::default();
        db.groups.insert(
            ROOT_GID,
            Group {
                gid: ROOT_GID,
                name: "root".to_string(),
            },
        );
        let mut root = User {
            uid: ROOT_UID,
            username: "root".to_string(),
            password: None,
            gid: ROOT_GID,
            home: "/root".to_string(),
            shell: "/bin/sh".to_string(),
            profile: Profile::default(),
            groups: BTreeSet::new(),
        };
        root.set_password(Some(root_password));
        db.users.insert(ROOT_UID, root);
        db
    }

    pub(crate) fn from_parts(users: Vec<User>, groups: Vec<Group>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.uid, u)).collect(),
            groups: groups.into_iter().map(|g| (g.gid, g)).collect(),
        }
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn user(&self, uid: Uid) -> Option<&User> {
        self.users.get(&uid)
    }

    pub fn user_mut(&mut self, uid: Uid) -> Option<&mut User> {
        self.users.get_mut(&uid)
    }

    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == name)
    }

    pub fn group(&self, gid: Gid) -> Option<&Group> {
        self.groups.get(&gid)
    }

    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups.values().find(|g| g.name == name)
    }

    /// Accept either a name or a numeric id.
    pub fn resolve_uid(&self, spec: &str) -> KernelResult<Uid> {
        if let Some(user) = self.user_by_name(spec) {
            return Ok(user.uid);
        }
        spec.parse::<Uid>()
            .ok()
            .filter(|uid| self.users.contains_key(uid))
            .ok_or_else(|| KernelError::UnknownUser(spec.to_string()))
    }

    pub fn resolve_gid(&self, spec: &str) -> KernelResult<Gid> {
        if let Some(group) = self.group_by_name(spec) {
            return Ok(group.gid);
        }
        spec.parse::<Gid>()
            .ok()
            .filter(|gid| self.groups.contains_key(gid))
            .ok_or_else(|| KernelError::UnknownGroup(spec.to_string()))
    }

    pub fn groups_of(&self, uid: Uid) -> Vec<Gid> {
        self.users.get(&uid).map(User::all_groups).unwrap_or_default()
    }

    fn next_free<T>(map: &BTreeMap<u32, T>) -> u32 {
        map.keys()
            .copied()
            .filter(|id| *id >= FIRST_REGULAR_ID)
            .max()
            .map(|id| id + 1)
            .unwrap_or(FIRST_REGULAR_ID)
    }

    pub fn add_group(&mut self, name: &str, gid: Option<Gid>) -> KernelResult<Gid> {
        if self.group_by_name(name).is_some() {
            return Err(KernelError::AlreadyExists);
        }
        let gid = gid.unwrap_or_else(|| Self::next_free(&self.groups));
        if self.groups.contains_key(&gid) {
            return Err(KernelError::AlreadyExists);
        }
        self.groups.insert(
            gid,
            Group {
                gid,
                name: name.to_string(),
            },
        );
        Ok(gid)
    }

    /// Create a user with a personal group of the same name and home under `/home`.
    pub fn add_user(&mut self, username: &str, password: Option<&str>) -> KernelResult<Uid> {
        validate_account_name(username)?;
        if self.user_by_name(username).is_some() {
            return Err(KernelError::AlreadyExists);
        }
        let uid = Self::next_free(&self.users);
        let gid = match self.group_by_name(username) {
            Some(group) => group.gid,
            None => {
                let preferred = (!self.groups.contains_key(&uid)).then_some(uid);
                self.add_group(username, preferred)?
            }
        };
        let mut user = User {
            uid,
            username: username.to_string(),
            password: None,
            gid,
            home: format!("/home/{}", username),
            shell: "/bin/sh".to_string(),
            profile: Profile::default(),
            groups: BTreeSet::new(),
        };
        user.set_password(password);
        self.users.insert(uid, user);
        Ok(uid)
    }

    pub fn remove_user(&mut self, username: &str) -> KernelResult<User> {
        let uid = self
            .user_by_name(username)
            .map(|u| u.uid)
            .ok_or_else(|| KernelError::UnknownUser(username.to_string()))?;
        if uid == ROOT_UID {
            return Err(KernelError::Busy);
        }
        self.users
            .remove(&uid)
            .ok_or_else(|| KernelError::UnknownUser(username.to_string()))
    }

    pub fn add_membership(&mut self, username: &str, group: &str) -> KernelResult<()> {
        let gid = self
            .group_by_name(group)
            .map(|g| g.gid)
            .ok_or_else(|| KernelError::UnknownGroup(group.to_string()))?;
        let uid = self
            .user_by_name(username)
            .map(|u| u.uid)
            .ok_or_else(|| KernelError::UnknownUser(username.to_string()))?;
        if let Some(user) = self.users.get_mut(&uid) {
            user.groups.insert(gid);
        }
        Ok(())
    }

    pub fn authenticate(&self, username: &str, password: &str) -> KernelResult<Uid> {
        let user = self
            .user_by_name(username)
            .ok_or_else(|| KernelError::UnknownUser(username.to_string()))?;
        if user.check_password(password) {
            Ok(user.uid)
        } else {
            Err(KernelError::AuthenticationFailed)
        }
    }

    pub fn render_passwd(&self) -> String {
        self.users
            .values()
            .map(|u| {
                format!(
                    "{}:x:{}:{}:{}:{}:{}\n",
                    u.username,
                    u.uid,
                    u.gid,
                    u.profile.to_gecos(),
                    u.home,
                    u.shell
                )
            })
            .collect()
    }

    pub fn render_shadow(&self) -> String {
        self.users
            .values()
            .map(|u| {
                format!(
                    "{}:{}:19000:0:99999:7:::\n",
                    u.username,
                    u.password.as_deref().unwrap_or("!")
                )
            })
            .collect()
    }

    pub fn render_group(&self) -> String {
        self.groups
            .values()
            .map(|g| {
                let members: Vec<&str> = self
                    .users
                    .values()
                    .filter(|u| u.groups.contains(&g.gid))
                    .map(|u| u.username.as_str())
                    .collect();
                format!("{}:x:{}:{}\n", g.name, g.gid, members.join(","))
            })
            .collect()
    }

    /// Replace the account list with what `/etc/passwd` now says.
    ///
    /// Existing users keep their password hash and memberships; new lines
    /// create passwordless accounts. Malformed lines are skipped. `root` can
    /// never be dropped.
    pub fn apply_passwd(&mut self, text: &str) {
        let mut next = BTreeMap::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 {
                continue;
            }
            let (Ok(uid), Ok(gid)) = (fields[2].parse::<Uid>(), fields[3].parse::<Gid>()) else {
                continue;
            };
            if validate_account_name(fields[0]).is_err() || next.contains_key(&uid) {
                continue;
            }
            let previous = self.user_by_name(fields[0]).or_else(|| self.users.get(&uid));
            next.insert(
                uid,
                User {
                    uid,
                    username: fields[0].to_string(),
                    password: previous.and_then(|u| u.password.clone()),
                    gid,
                    home: fields[5].to_string(),
                    shell: fields[6].to_string(),
                    profile: Profile::from_gecos(fields[4]),
                    groups: previous.map(|u| u.groups.clone()).unwrap_or_default(),
                },
            );
        }
        if !next.contains_key(&ROOT_UID) {
            if let Some(root) = self.users.get(&ROOT_UID) {
                next.insert(ROOT_UID, root.clone());
            }
        }
        self.users = next;
    }

    /// Take password hashes from `/etc/shadow`. `!`, `*` and empty mean no password.
    pub fn apply_shadow(&mut self, text: &str) {
        for line in text.lines() {
            let mut fields = line.split(':');
            let (Some(name), Some(hash)) = (fields.next(), fields.next()) else {
                continue;
            };
            let uid = match self.user_by_name(name) {
                Some(user) => user.uid,
                None => continue,
            };
            if let Some(user) = self.users.get_mut(&uid) {
                user.password = match hash {
                    "" | "!" | "*" => None,
                    hash => Some(hash.to_string()),
                };
            }
        }
    }

    /// Replace groups and supplementary memberships from `/etc/group`.
    pub fn apply_group(&mut self, text: &str) {
        let mut groups = BTreeMap::new();
        let mut members: Vec<(Gid, String)> = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 3 || fields[0].is_empty() {
                continue;
            }
            let Ok(gid) = fields[2].parse::<Gid>() else {
                continue;
            };
            groups.insert(
                gid,
                Group {
                    gid,
                    name: fields[0].to_string(),
                },
            );
            if let Some(list) = fields.get(3) {
                members.extend(
                    list.split(',')
                        .map(str::trim)
                        .filter(|m| !m.is_empty())
                        .map(|m| (gid, m.to_string())),
                );
            }
        }
        groups.entry(ROOT_GID).or_insert_with(|| Group {
            gid: ROOT_GID,
            name: "root".to_string(),
        });
        for user in self.users.values_mut() {
            user.groups.clear();
        }
        for (gid, name) in members {
            if let Some(user) = self.users.values_mut().find(|u| u.username == name) {
                user.groups.insert(gid);
            }
        }
        self.groups = groups;
    }
}

fn validate_account_name(name: &str) -> KernelResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(KernelError::invalid(format!("invalid account name '{}'", name)))
    }
}
