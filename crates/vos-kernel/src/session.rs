// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Login sessions. `login`/`su` push, `exit` pops.

use std::collections::BTreeMap;

use crate::types::{NodeRef, Pid, Uid};

pub const DEFAULT_PATH: &str = "/bin:/usr/bin";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: u32,
    pub real_uid: Uid,
    pub effective_uid: Uid,
    pub cwd: NodeRef,
    pub env: BTreeMap<String, String>,
    /// Shell process backing this session
    pub pid: Option<Pid>,
}

impl Session {
    /// Fresh environment: `PATH`, `HOME` and `USER`.
    pub fn default_env(home: &str, username: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("PATH".to_string(), DEFAULT_PATH.to_string()),
            ("HOME".to_string(), home.to_string()),
            ("USER".to_string(), username.to_string()),
        ])
    }

    pub fn home(&self) -> Option<&str> {
        self.env.get("HOME").map(String::as_str)
    }

    /// `PATH` split into directories, skipping empty entries.
    pub fn search_path(&self) -> Vec<&str> {
        self.env
            .get("PATH")
            .map(String::as_str)
            .unwrap_or(DEFAULT_PATH)
            .split(':')
            .filter(|p| !p.is_empty())
            .collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionStack {
    sessions: Vec<Session>,
    next_id: u32,
}

impl SessionStack {
    pub(crate) fn from_parts(sessions: Vec<Session>, next_id: u32) -> Self {
        let floor = sessions.iter().map(|s| s.id + 1).max().unwrap_or(0);
        Self {
            sessions,
            next_id: next_id.max(floor),
        }
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn push(
        &mut self,
        uid: Uid,
        cwd: NodeRef,
        env: BTreeMap<String, String>,
        pid: Option<Pid>,
    ) -> &Session {
        let id = self.next_id;
        self.next_id += 1;
        self.sessions.push(Session {
            id,
            real_uid: uid,
            effective_uid: uid,
            cwd,
            env,
            pid,
        });
        &self.sessions[self.sessions.len() - 1]
    }

    pub fn pop(&mut self) -> Option<Session> {
        self.sessions.pop()
    }

    pub fn current(&self) -> Option<&Session> {
        self.sessions.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut Session> {
        self.sessions.last_mut()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InodeId, MountId};

    fn cwd() -> NodeRef {
        NodeRef::new(MountId(0), InodeId(1))
    }

    #[test]
    fn test_push_pop_order() {
        let mut stack = SessionStack::default();
        stack.push(0, cwd(), Session::default_env("/root", "root"), None);
        let second = stack.push(1000, cwd(), Session::default_env("/home/a", "a"), None).id;
        assert_eq!(second, 1);
        assert_eq!(stack.current().map(|s| s.real_uid), Some(1000));
        assert_eq!(stack.pop().map(|s| s.id), Some(1));
        assert_eq!(stack.current().map(|s| s.real_uid), Some(0));
        // ids are never handed out twice
        assert_eq!(stack.push(5, cwd(), BTreeMap::new(), None).id, 2);
    }

    #[test]
    fn test_search_path() {
        let mut stack = SessionStack::default();
        stack.push(0, cwd(), Session::default_env("/root", "root"), None);
        let session = stack.current_mut().expect("session");
        assert_eq!(session.search_path(), vec!["/bin", "/usr/bin"]);
        assert_eq!(session.home(), Some("/root"));
        session.env.insert("PATH".into(), "/opt/bin::/sbin".into());
        assert_eq!(session.search_path(), vec!["/opt/bin", "/sbin"]);
    }
}
