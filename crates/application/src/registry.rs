//! 身份注册表
//!
//! 维护显示名称到连接的一一映射。注册表本身不加锁，
//! 所有修改都在中继的临界区内串行执行。

use std::collections::HashMap;

use domain::{ConnectionId, DomainError, DomainResult, Username};

#[derive(Debug, Clone)]
struct Binding {
    name: Username,
    /// 插入序号，决定名单顺序
    seq: u64,
}

#[derive(Debug, Default)]
pub struct IdentityRegistry {
    owners: HashMap<Username, ConnectionId>,
    bindings: HashMap<ConnectionId, Binding>,
    next_seq: u64,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// 为连接绑定名称。名称已被占用或连接已有身份时失败。
    pub fn register(&mut self, name: Username, connection: ConnectionId) -> DomainResult<()> {
        if self.owners.contains_key(&name) {
            return Err(DomainError::name_taken(name.as_str()));
        }
        if let Some(existing) = self.bindings.get(&connection) {
            return Err(DomainError::already_registered(existing.name.as_str()));
        }

        let seq = self.bump_seq();
        self.owners.insert(name.clone(), connection);
        self.bindings.insert(connection, Binding { name, seq });
        Ok(())
    }

    /// 修改连接的名称，成功时返回旧名称。
    ///
    /// 新名称被其他连接占用时失败且不产生任何副作用；改成自己当前的名称是空操作。
    pub fn rename(
        &mut self,
        connection: ConnectionId,
        new_name: Username,
    ) -> DomainResult<Username> {
        let current = self
            .bindings
            .get(&connection)
            .map(|binding| binding.name.clone())
            .ok_or(DomainError::NotRegistered)?;

        if current == new_name {
            return Ok(current);
        }
        if let Some(holder) = self.owners.get(&new_name) {
            if *holder != connection {
                return Err(DomainError::name_taken(new_name.as_str()));
            }
        }

        let seq = self.bump_seq();
        self.owners.remove(&current);
        self.owners.insert(new_name.clone(), connection);
        if let Some(binding) = self.bindings.get_mut(&connection) {
            binding.name = new_name;
            binding.seq = seq;
        }
        Ok(current)
    }

    /// 释放连接持有的名称，可重复调用。
    pub fn release(&mut self, connection: ConnectionId) -> Option<Username> {
        let binding = self.bindings.remove(&connection)?;
        self.owners.remove(&binding.name);
        Some(binding.name)
    }

    /// 当前在线名单，按插入顺序排列（改名视为重新插入）
    pub fn snapshot(&self) -> Vec<String> {
        let mut bindings: Vec<&Binding> = self.bindings.values().collect();
        bindings.sort_by_key(|binding| binding.seq);
        bindings
            .into_iter()
            .map(|binding| binding.name.to_string())
            .collect()
    }

    /// 持有该名称的连接
    pub fn holder(&self, name: &str) -> Option<ConnectionId> {
        self.owners.get(name).copied()
    }

    pub fn name_of(&self, connection: ConnectionId) -> Option<&Username> {
        self.bindings.get(&connection).map(|binding| &binding.name)
    }

    /// 已注册的连接
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.bindings.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
