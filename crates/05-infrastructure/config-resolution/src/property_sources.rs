//! 附加属性源声明
//!
//! 后处理的声明优先级更高：第一个属性源追加到环境末尾，其后的每个插入到上一个之前。
//! 同名属性源合并为组合属性源，新成员排在最前。

use crate::parser::GraphBuilder;
use config_abstractions::{PropertyResolver, PropertySource};
use config_impl::{CompositePropertySource, MapPropertySource};
use infrastructure_common::markers::PROPERTY_SOURCE;
use infrastructure_common::{
    ConfigError, MarkerAttributes, MetadataView, ResolutionError, ResolutionResult,
};
use std::sync::Arc;
use tracing::{debug, info};

impl GraphBuilder<'_> {
    /// 处理一条属性源声明：`value`/`locations` 为位置列表，`name` 可选，
    /// `ignore_resource_not_found` 为真时忽略缺失的文件与无法解析的占位符
    pub(crate) fn process_property_source(
        &mut self,
        attributes: &MarkerAttributes,
        view: &dyn MetadataView,
    ) -> ResolutionResult<()> {
        let locations =
            attributes.aliased_list("value", "locations", PROPERTY_SOURCE, view.type_name())?;
        if locations.is_empty() {
            return Err(ResolutionError::invalid_definition(
                view.type_name(),
                "属性源声明至少需要一个位置",
            ));
        }
        let name = attributes.get_str("name").map(str::to_string);
        let ignore_not_found = attributes.get_bool("ignore_resource_not_found", false);

        for location in locations {
            match self.load_property_source(name.as_deref(), &location) {
                Ok((source, resolved)) => self.add_property_source(source, resolved)?,
                Err(e) if ignore_not_found && is_ignorable(&e) => {
                    info!("忽略无法加载的属性源 {} (声明于 {}): {}", location, view.type_name(), e);
                }
                Err(e) => {
                    return Err(ResolutionError::ResourceLoad {
                        location,
                        source_type: view.type_name().to_string(),
                        source: e,
                    })
                }
            }
        }
        Ok(())
    }

    /// 返回属性源及解析占位符后的位置
    fn load_property_source(
        &self,
        name: Option<&str>,
        location: &str,
    ) -> Result<(MapPropertySource, String), ConfigError> {
        let resolved = self.environment.resolve_required_placeholders(location)?;
        let source = self
            .collab
            .property_loader
            .load(name.unwrap_or(&resolved), &resolved)?;
        Ok((source, resolved))
    }

    fn add_property_source(
        &mut self,
        source: MapPropertySource,
        location: String,
    ) -> ResolutionResult<()> {
        let name = source.name().to_string();
        let sources = self.environment.property_sources_mut();

        if self.state.property_source_names.contains(&name) {
            if let Some(existing) = sources.get(&name) {
                // 组合内的成员以各自的位置命名
                let mut composite = CompositePropertySource::new(name.clone());
                composite.add_first(Arc::new(source.with_name(location)));
                match existing.nested_sources() {
                    Some(members) => {
                        for member in members {
                            composite.add_last(member);
                        }
                    }
                    None => composite.add_last(existing),
                }
                debug!(
                    "属性源 '{}' 已存在，合并为组合属性源 ({} 个成员)",
                    name,
                    composite.sources().len()
                );
                sources.replace(&name, Arc::new(composite))?;
                return Ok(());
            }
        }

        match self.state.property_source_names.last() {
            None => sources.add_last(Arc::new(source)),
            Some(previous) => sources.add_before(previous, Arc::new(source))?,
        }
        info!("加入属性源 '{}'", name);
        self.state.property_source_names.push(name);
        Ok(())
    }
}

fn is_ignorable(error: &ConfigError) -> bool {
    matches!(
        error,
        ConfigError::FileNotFound { .. } | ConfigError::UnresolvablePlaceholder { .. }
    )
}
