//! 导入栈与导入边登记

use indexmap::IndexMap;
use infrastructure_common::MetadataView;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// 导入目标的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Plain,
    Selector,
    DeferredSelector,
    Registrar,
}

/// 导入边 importer -> target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportEdge {
    pub importer: String,
    pub target: String,
    pub kind: ImportKind,
}

/// 导入栈
///
/// 处理导入期间的活动链，同时登记“被谁导入”关系与导入边。
/// 不可在并发的解析过程之间共享。
#[derive(Debug, Default)]
pub struct ImportStack {
    stack: Vec<String>,
    /// 被导入类型 -> 导入方元数据，按登记顺序
    importers: IndexMap<String, Vec<Arc<dyn MetadataView>>>,
    edges: IndexMap<(String, String), ImportEdge>,
}

impl ImportStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str) {
        self.stack.push(key.to_string());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.stack.pop()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.stack.iter().any(|k| k == key)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// 登记 `imported` 由 `importing` 导入
    pub fn register_import(&mut self, importing: Arc<dyn MetadataView>, imported: &str) {
        let entry = self.importers.entry(imported.to_string()).or_default();
        // 重复导入时移到末尾，使其成为最近一次导入方
        entry.retain(|m| m.type_name() != importing.type_name());
        entry.push(importing);
    }

    /// 记录导入边，同一 (importer, target) 只记录一次
    pub fn record_edge(&mut self, importer: &str, target: &str, kind: ImportKind) -> bool {
        let key = (importer.to_string(), target.to_string());
        if self.edges.contains_key(&key) {
            return false;
        }
        debug!("记录导入边 {} -> {} ({:?})", importer, target, kind);
        self.edges.insert(
            key,
            ImportEdge {
                importer: importer.to_string(),
                target: target.to_string(),
                kind,
            },
        );
        true
    }

    /// 最近一次导入该类型的导入方
    pub fn importing_source_for(&self, imported: &str) -> Option<&Arc<dyn MetadataView>> {
        self.importers.get(imported).and_then(|list| list.last())
    }

    /// 从导入方列表和导入边中移除某个导入方
    pub fn remove_importing_source(&mut self, importing: &str) {
        for list in self.importers.values_mut() {
            list.retain(|m| m.type_name() != importing);
        }
        self.importers.retain(|_, list| !list.is_empty());
        self.edges.retain(|(importer, _), _| importer != importing);
    }

    /// `key` 是否已处于活动导入链中，且沿“被谁导入”关系能回到自身
    pub fn is_chained_import_on_stack(&self, key: &str) -> bool {
        if !self.contains(key) {
            return false;
        }
        let mut visited = HashSet::new();
        let mut current = key.to_string();
        while let Some(importing) = self.importing_source_for(&current) {
            let name = importing.type_name();
            if name == key {
                return true;
            }
            if !visited.insert(name.to_string()) {
                break;
            }
            current = name.to_string();
        }
        false
    }

    /// 从 `key` 首次入栈处到栈顶的导入链，末尾再接上 `key`
    pub fn chain_description(&self, key: &str) -> String {
        let start = self.stack.iter().position(|k| k == key).unwrap_or(0);
        let mut chain: Vec<&str> = self.stack[start..].iter().map(String::as_str).collect();
        chain.push(key);
        chain.join(" -> ")
    }

    pub fn edges(&self) -> impl Iterator<Item = &ImportEdge> {
        self.edges.values()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// 导入方为 `importer` 的全部导入边
    pub fn edges_from<'a>(
        &'a self,
        importer: &'a str,
    ) -> impl Iterator<Item = &'a ImportEdge> + 'a {
        self.edges.values().filter(move |e| e.importer == importer)
    }
}
