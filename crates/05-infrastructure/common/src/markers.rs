//! 标记名称约定与元标记闭包缓存

use crate::metadata::{Marker, MarkerAttributes, MetadataView, MethodMetadata, TypeLoader};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// 组件构造型
pub const COMPONENT: &str = "di.stereotype.Component";
/// 配置源构造型，本身带有 [`COMPONENT`] 元标记
pub const CONFIGURATION: &str = "di.stereotype.Configuration";
pub const SERVICE: &str = "di.stereotype.Service";
pub const REPOSITORY: &str = "di.stereotype.Repository";
pub const CONTROLLER: &str = "di.stereotype.Controller";

/// 导入指令，`value` 为目标类型列表
pub const IMPORT: &str = "di.context.Import";
/// 导入外部资源定义，`locations`/`value` 与 `reader`
pub const IMPORT_RESOURCE: &str = "di.context.ImportResource";
/// 组件扫描指令
pub const COMPONENT_SCAN: &str = "di.context.ComponentScan";
/// 附加属性源声明
pub const PROPERTY_SOURCE: &str = "di.context.PropertySource";
/// 工厂方法声明
pub const BEAN: &str = "di.context.Bean";
/// 条件声明，`value` 为条件名列表
pub const CONDITIONAL: &str = "di.context.Conditional";
pub const ORDER: &str = "di.context.Order";
pub const PRIMARY: &str = "di.context.Primary";
pub const LAZY: &str = "di.context.Lazy";
pub const DEPENDS_ON: &str = "di.context.DependsOn";
pub const ROLE: &str = "di.context.Role";
pub const DESCRIPTION: &str = "di.context.Description";

/// 按属性值启用
pub const CONDITIONAL_ON_PROPERTY: &str = "di.condition.ConditionalOnProperty";
/// 注册表中存在指定定义时启用
pub const CONDITIONAL_ON_DEFINITION: &str = "di.condition.ConditionalOnDefinition";
/// 注册表中不存在指定定义时启用
pub const CONDITIONAL_ON_MISSING_DEFINITION: &str = "di.condition.ConditionalOnMissingDefinition";

/// 平台根类型
pub const ROOT_TYPE: &str = "core.Object";
/// 语言级元标记前缀，展开元标记时忽略
pub const CORE_ANNOTATION_PREFIX: &str = "core.annotation.";
/// 构造型前缀
pub const STEREOTYPE_PREFIX: &str = "di.stereotype.";

/// 顺序常量，数值越小优先级越高
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// 元标记闭包索引
///
/// 对每个标记类型只计算一次其传递蕴含的全部元标记并按标记名缓存。
/// 缓存只在一次解析内有效，解析结束时通过 [`MarkerIndex::clear`] 释放。
pub struct MarkerIndex {
    loader: Arc<dyn TypeLoader>,
    implied: Mutex<HashMap<String, Arc<[Marker]>>>,
}

impl std::fmt::Debug for MarkerIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerIndex")
            .field("cached", &self.implied.lock().len())
            .field("loader", &"<type loader>")
            .finish()
    }
}

impl MarkerIndex {
    pub fn new(loader: Arc<dyn TypeLoader>) -> Self {
        Self {
            loader,
            implied: Mutex::new(HashMap::new()),
        }
    }

    /// 标记类型传递蕴含的元标记（不含自身）
    pub fn implied_by(&self, marker_name: &str) -> Arc<[Marker]> {
        if let Some(cached) = self.implied.lock().get(marker_name) {
            return cached.clone();
        }
        let computed: Arc<[Marker]> = self.compute_closure(marker_name).into();
        self.implied
            .lock()
            .insert(marker_name.to_string(), computed.clone());
        computed
    }

    fn compute_closure(&self, marker_name: &str) -> Vec<Marker> {
        let mut visited = HashSet::new();
        visited.insert(marker_name.to_string());
        let mut closure = Vec::new();
        self.walk(marker_name, &mut visited, &mut closure);
        debug!("计算元标记闭包: {} -> {} 个", marker_name, closure.len());
        closure
    }

    fn walk(&self, marker_name: &str, visited: &mut HashSet<String>, out: &mut Vec<Marker>) {
        let Ok(marker_type) = self.loader.load(marker_name) else {
            return;
        };
        for meta in marker_type.markers() {
            if meta.name.starts_with(CORE_ANNOTATION_PREFIX) || !visited.insert(meta.name.clone()) {
                continue;
            }
            out.push(meta.clone());
            self.walk(&meta.name, visited, out);
        }
    }

    /// 合并直接标记与元标记：直接标记在前，随后是各直接标记的传递元标记
    pub fn merged(&self, markers: &[Marker]) -> Vec<Marker> {
        let mut merged: Vec<Marker> = markers.to_vec();
        for marker in markers {
            merged.extend(self.implied_by(&marker.name).iter().cloned());
        }
        merged
    }

    pub fn merged_for(&self, metadata: &dyn MetadataView) -> Vec<Marker> {
        self.merged(metadata.markers())
    }

    pub fn merged_for_method(&self, method: &MethodMetadata) -> Vec<Marker> {
        self.merged(&method.markers)
    }

    /// 标记是否直接或作为元标记出现
    pub fn is_present(&self, metadata: &dyn MetadataView, marker_name: &str) -> bool {
        metadata.has_marker(marker_name)
            || metadata
                .markers()
                .iter()
                .any(|m| self.implied_by(&m.name).iter().any(|i| i.name == marker_name))
    }

    /// 第一个匹配的标记属性，直接声明优先
    pub fn find(&self, metadata: &dyn MetadataView, marker_name: &str) -> Option<MarkerAttributes> {
        if let Some(direct) = metadata.marker_attributes(marker_name) {
            return Some(direct.clone());
        }
        self.merged_for(metadata)
            .into_iter()
            .find(|m| m.name == marker_name)
            .map(|m| m.attributes)
    }

    /// 全部匹配的标记属性（可重复标记）
    pub fn find_all(
        &self,
        metadata: &dyn MetadataView,
        marker_name: &str,
    ) -> Vec<MarkerAttributes> {
        self.merged_for(metadata)
            .into_iter()
            .filter(|m| m.name == marker_name)
            .map(|m| m.attributes)
            .collect()
    }

    /// 是否为构造型标记：自身为组件构造型，或蕴含组件构造型
    pub fn is_stereotype(&self, marker_name: &str) -> bool {
        marker_name == COMPONENT || self.implied_by(marker_name).iter().any(|m| m.name == COMPONENT)
    }

    pub fn cached_len(&self) -> usize {
        self.implied.lock().len()
    }

    /// 释放缓存
    pub fn clear(&self) {
        self.implied.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MetadataError;
    use crate::metadata::TypeKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct MarkerType {
        name: String,
        markers: Vec<Marker>,
    }

    impl MetadataView for MarkerType {
        fn type_name(&self) -> &str {
            &self.name
        }
        fn kind(&self) -> TypeKind {
            TypeKind::Marker
        }
        fn markers(&self) -> &[Marker] {
            &self.markers
        }
        fn superclass_name(&self) -> Option<&str> {
            None
        }
        fn interface_names(&self) -> &[String] {
            &[]
        }
        fn nested_type_names(&self) -> &[String] {
            &[]
        }
        fn methods(&self) -> &[MethodMetadata] {
            &[]
        }
    }

    #[derive(Default)]
    struct CountingLoader {
        loads: AtomicUsize,
    }

    impl TypeLoader for CountingLoader {
        fn load(&self, type_name: &str) -> Result<Arc<dyn MetadataView>, MetadataError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let markers = match type_name {
                CONFIGURATION => vec![Marker::new(COMPONENT)],
                "app.EnableThing" => vec![
                    Marker::new(IMPORT).with("value", vec!["app.ThingConfig"]),
                    Marker::new("core.annotation.Retention"),
                    Marker::new("app.Loop"),
                ],
                "app.Loop" => vec![Marker::new("app.EnableThing")],
                COMPONENT => vec![Marker::new("core.annotation.Documented")],
                _ => {
                    return Err(MetadataError::TypeNotFound {
                        type_name: type_name.to_string(),
                    })
                }
            };
            Ok(Arc::new(MarkerType {
                name: type_name.to_string(),
                markers,
            }))
        }
    }

    #[test]
    fn test_closure_is_cached_per_marker() {
        let loader = Arc::new(CountingLoader::default());
        let index = MarkerIndex::new(loader.clone());
        assert!(index.is_stereotype(CONFIGURATION));
        let after_first = loader.loads.load(Ordering::SeqCst);
        assert!(index.is_stereotype(CONFIGURATION));
        assert_eq!(loader.loads.load(Ordering::SeqCst), after_first);

        index.clear();
        assert_eq!(index.cached_len(), 0);
    }

    #[test]
    fn test_closure_skips_core_annotations_and_cycles() {
        let index = MarkerIndex::new(Arc::new(CountingLoader::default()));
        let implied = index.implied_by("app.EnableThing");
        let names: Vec<&str> = implied.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec![IMPORT, "app.Loop"]);
    }

    #[test]
    fn test_find_all_collects_meta_markers() {
        let index = MarkerIndex::new(Arc::new(CountingLoader::default()));
        let source = MarkerType {
            name: "app.Root".to_string(),
            markers: vec![
                Marker::new(IMPORT).with("value", vec!["app.Direct"]),
                Marker::new("app.EnableThing"),
            ],
        };
        let imports = index.find_all(&source, IMPORT);
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].get_list("value"), vec!["app.Direct"]);
        assert_eq!(imports[1].get_list("value"), vec!["app.ThingConfig"]);
        assert!(index.is_present(&source, IMPORT));
        assert!(!index.is_present(&source, COMPONENT));
    }
}
