//! 运行时错误.
//!
//! 配置错误与资源错误都会终止当前帧的分割, 以 `Err` 形式返回给调用方.
//! 单个连通域的异常 (无法聚类的退化连通域) 不属于错误, 只会记录一条警告.

use std::fmt;

/// 单个配置项的问题.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigIssue {
    /// 缺少必需的键.
    Missing(&'static str),

    /// 值的类型不符合要求.
    WrongType {
        /// 键名.
        key: &'static str,
        /// 期望的类型描述.
        expected: &'static str,
    },

    /// 值超出允许范围.
    OutOfRange {
        /// 键名.
        key: &'static str,
        /// 实际的值.
        value: f64,
        /// 约束描述, 如 `"> 0"`.
        constraint: &'static str,
    },

    /// 不认识的键.
    UnknownKey(String),
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigIssue::Missing(key) => write!(f, "missing parameter `{key}`"),
            ConfigIssue::WrongType { key, expected } => {
                write!(f, "parameter `{key}` should be of type {expected}")
            }
            ConfigIssue::OutOfRange {
                key,
                value,
                constraint,
            } => write!(f, "parameter `{key}` = {value} violates `{constraint}`"),
            ConfigIssue::UnknownKey(key) => write!(f, "unknown parameter `{key}`"),
        }
    }
}

/// 一次校验中发现的全部配置问题.
///
/// # 注意
///
/// 只有非空时才会被构造出来, 见 [`ConfigError::from_issues`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    issues: Vec<ConfigIssue>,
}

impl ConfigError {
    /// 由单个问题构造.
    #[inline]
    pub fn single(issue: ConfigIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }

    /// 若 `issues` 为空, 返回 `Ok(())`, 否则返回包含全部问题的 `Err`.
    pub fn from_issues(issues: Vec<ConfigIssue>) -> Result<(), Self> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(Self { issues })
        }
    }

    /// 获取全部问题.
    #[inline]
    pub fn issues(&self) -> &[ConfigIssue] {
        &self.issues
    }

    /// 是否包含关于 `key` 的问题?
    pub fn concerns(&self, key: &str) -> bool {
        self.issues.iter().any(|i| match i {
            ConfigIssue::Missing(k)
            | ConfigIssue::WrongType { key: k, .. }
            | ConfigIssue::OutOfRange { key: k, .. } => *k == key,
            ConfigIssue::UnknownKey(k) => k == key,
        })
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration:")?;
        for issue in self.issues.iter() {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

/// 单帧分割失败的原因.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentError {
    /// 配置错误. 流程不会开始执行.
    Configuration(ConfigError),

    /// 无法申请工作缓冲区或线程池.
    Resource {
        /// 申请资源的阶段.
        context: &'static str,
        /// 申请的字节数. 线程池等非内存资源为 0.
        bytes: usize,
    },
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentError::Configuration(e) => fmt::Display::fmt(e, f),
            SegmentError::Resource { context, bytes: 0 } => {
                write!(f, "unable to acquire resource for {context}")
            }
            SegmentError::Resource { context, bytes } => {
                write!(f, "unable to allocate {bytes} bytes for {context}")
            }
        }
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SegmentError::Configuration(e) => Some(e),
            SegmentError::Resource { .. } => None,
        }
    }
}

impl From<ConfigError> for SegmentError {
    #[inline]
    fn from(e: ConfigError) -> Self {
        SegmentError::Configuration(e)
    }
}

impl From<ConfigIssue> for SegmentError {
    #[inline]
    fn from(issue: ConfigIssue) -> Self {
        SegmentError::Configuration(ConfigError::single(issue))
    }
}

/// 分割流程的返回类型.
pub type SegmentResult<T> = Result<T, SegmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_issues_is_ok() {
        assert!(ConfigError::from_issues(vec![]).is_ok());
    }

    #[test]
    fn test_message_lists_every_issue() {
        let e = ConfigError::from_issues(vec![
            ConfigIssue::Missing("KAPPA"),
            ConfigIssue::OutOfRange {
                key: "DELTA",
                value: 0.0,
                constraint: "!= 0",
            },
        ])
        .unwrap_err();
        let msg = SegmentError::from(e.clone()).to_string();
        assert!(msg.contains("KAPPA"));
        assert!(msg.contains("DELTA"));
        assert!(e.concerns("DELTA"));
        assert!(!e.concerns("GAMMA"));
    }

    #[test]
    fn test_resource_message() {
        let e = SegmentError::Resource {
            context: "gaussian filter",
            bytes: 4096,
        };
        assert_eq!(
            e.to_string(),
            "unable to allocate 4096 bytes for gaussian filter"
        );
    }
}
