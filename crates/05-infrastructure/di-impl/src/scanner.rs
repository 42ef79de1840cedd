//! 基于类型目录的组件扫描器

use crate::catalog::TypeCatalog;
use di_abstractions::{ComponentScanner, ScanDirective, TypeFilter};
use infrastructure_common::markers::COMPONENT;
use infrastructure_common::{
    package_of, MarkerIndex, MetadataView, ResolutionError, TypeKind, TypeLoader,
};
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

/// 在 [`TypeCatalog`] 中按包路径扫描候选组件
#[derive(Debug, Clone)]
pub struct CatalogComponentScanner {
    catalog: Arc<TypeCatalog>,
}

enum CompiledFilter {
    Marker(String),
    AssignableTo(String),
    Regex(Regex),
}

impl CatalogComponentScanner {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self { catalog }
    }

    fn compile(
        directive: &ScanDirective,
        filters: &[TypeFilter],
    ) -> Result<Vec<CompiledFilter>, ResolutionError> {
        filters
            .iter()
            .map(|filter| match filter {
                TypeFilter::Marker(name) => Ok(CompiledFilter::Marker(name.clone())),
                TypeFilter::AssignableTo(name) => Ok(CompiledFilter::AssignableTo(name.clone())),
                TypeFilter::Regex(pattern) => Regex::new(&format!("^(?:{})$", pattern))
                    .map(CompiledFilter::Regex)
                    .map_err(|e| ResolutionError::InvalidScanDirective {
                        source_type: directive.declaring_type.clone(),
                        message: format!("无效的正则过滤器 '{}': {}", pattern, e),
                    }),
            })
            .collect()
    }

    fn filter_matches(
        &self,
        filter: &CompiledFilter,
        view: &dyn MetadataView,
        markers: &MarkerIndex,
    ) -> bool {
        match filter {
            CompiledFilter::Marker(name) => markers.is_present(view, name),
            CompiledFilter::AssignableTo(target) => {
                self.catalog.is_assignable(view.type_name(), target)
            }
            CompiledFilter::Regex(regex) => regex.is_match(view.type_name()),
        }
    }

    fn in_packages(type_name: &str, packages: &[String]) -> bool {
        let package = package_of(type_name);
        packages
            .iter()
            .any(|base| package == base || package.starts_with(&format!("{}.", base)))
    }
}

impl ComponentScanner for CatalogComponentScanner {
    fn scan(
        &self,
        directive: &ScanDirective,
        markers: &MarkerIndex,
    ) -> Result<Vec<Arc<dyn MetadataView>>, ResolutionError> {
        let includes = Self::compile(directive, &directive.include_filters)?;
        let excludes = Self::compile(directive, &directive.exclude_filters)?;

        let mut found = Vec::new();
        for name in self.catalog.type_names() {
            if name == directive.declaring_type
                || !Self::in_packages(name, &directive.base_packages)
            {
                continue;
            }
            let view = self.catalog.load(name)?;
            if view.kind() != TypeKind::Class || view.is_abstract() {
                continue;
            }
            if excludes
                .iter()
                .any(|f| self.filter_matches(f, view.as_ref(), markers))
            {
                debug!("扫描排除: {}", name);
                continue;
            }
            let included = (directive.use_default_filters
                && markers.is_present(view.as_ref(), COMPONENT))
                || includes
                    .iter()
                    .any(|f| self.filter_matches(f, view.as_ref(), markers));
            if included {
                found.push(view);
            }
        }

        info!(
            "组件扫描 {:?} 完成 (声明于 {}): 发现 {} 个候选",
            directive.base_packages,
            directive.declaring_type,
            found.len()
        );
        Ok(found)
    }
}
