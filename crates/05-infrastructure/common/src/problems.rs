//! 结构性问题收集
//!
//! 解析过程中发现的循环导入、无法解析的类型等问题不会立即中断解析，
//! 而是记录在 [`ProblemReport`] 中，待整轮解析完成后统一上报。

use std::fmt;
use tracing::{error, warn};

/// 问题类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    /// 循环导入
    CircularImport,
    /// 无法解析的嵌套类型或父类型
    UnresolvableType,
    /// 非法的工厂方法声明
    InvalidFactoryMethod,
    /// 非法的配置源声明
    InvalidConfigurationSource,
    /// 延迟导入分组返回了未知的导入方
    UnknownImportingSource,
}

/// 问题严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

/// 单个结构性问题
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub kind: ProblemKind,
    pub severity: Severity,
    /// 出问题的配置源
    pub source: Option<String>,
    pub message: String,
}

impl Problem {
    pub fn error(kind: ProblemKind, source: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            source: source.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn warning(kind: ProblemKind, source: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            source: source.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        };
        match &self.source {
            Some(source) => write!(f, "[{}] {:?} @ {}: {}", level, self.kind, source, self.message),
            None => write!(f, "[{}] {:?}: {}", level, self.kind, self.message),
        }
    }
}

/// 问题报告
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemReport {
    problems: Vec<Problem>,
}

impl ProblemReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录问题
    pub fn report(&mut self, problem: Problem) {
        match problem.severity {
            Severity::Error => error!("{}", problem),
            Severity::Warning => warn!("{}", problem),
        }
        self.problems.push(problem);
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(|p| p.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.problems
            .iter()
            .filter(|p| p.severity == Severity::Error)
            .count()
    }

    /// 按类别筛选
    pub fn of_kind(&self, kind: ProblemKind) -> impl Iterator<Item = &Problem> {
        self.problems.iter().filter(move |p| p.kind == kind)
    }

    pub fn warnings(&self) -> Vec<Problem> {
        self.problems
            .iter()
            .filter(|p| p.severity == Severity::Warning)
            .cloned()
            .collect()
    }
}

impl fmt::Display for ProblemReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for problem in &self.problems {
            writeln!(f, "  - {}", problem)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_count_ignores_warnings() {
        let mut report = ProblemReport::new();
        report.report(Problem::warning(
            ProblemKind::UnresolvableType,
            Some("app.Config"),
            "嵌套类型缺失",
        ));
        assert!(!report.has_errors());

        report.report(Problem::error(
            ProblemKind::CircularImport,
            Some("app.A"),
            "app.A->app.B->app.A",
        ));
        assert!(report.has_errors());
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.of_kind(ProblemKind::CircularImport).count(), 1);
        assert_eq!(report.warnings().len(), 1);
    }

    #[test]
    fn test_display_lists_every_problem() {
        let mut report = ProblemReport::new();
        report.report(Problem::error(ProblemKind::CircularImport, None, "a->b->a"));
        let text = report.to_string();
        assert!(text.contains("CircularImport"));
        assert!(text.contains("a->b->a"));
    }
}
