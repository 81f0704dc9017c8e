//! 규칙 파일 로더 — YAML 규칙 파일을 디스크에서 로드합니다.
//!
//! 규칙 디렉토리 내의 `.yml`/`.yaml` 파일을 스캔하고 파싱합니다.
//! 파일 하나가 규칙 하나에 대응합니다. 개별 파일 파싱 실패는 경고 로그를
//! 남기고 건너뜁니다 — 설정 문제 하나가 나머지 규칙 로딩을 막지 않습니다.
//!
//! # 규칙 파일 형식
//! ```yaml
//! id: 1
//! name: allow-internal
//! enabled: true
//! source_cidr: 10.0.0.0/24
//! message_regex: "error|warn"
//! ```

use std::path::Path;

use logship_core::types::Rule;

use crate::error::SyslogPipelineError;

/// 규칙 파일 크기 상한
const MAX_RULE_FILE_SIZE: u64 = 1024 * 1024; // 1MB
/// 로드 가능한 규칙 수 상한
const MAX_RULES_COUNT: usize = 10_000;

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 디렉토리에서 모든 YAML 규칙 파일을 로드합니다.
    ///
    /// `.yml` 또는 `.yaml` 확장자를 가진 파일만 처리합니다.
    /// 개별 파일 로딩 실패와 중복 id는 경고 로그를 남기고 건너뜁니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 규칙 수가 `MAX_RULES_COUNT`를 초과하는 경우
    pub async fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<Rule>, SyslogPipelineError> {
        let dir = dir.as_ref();

        let mut entries =
            tokio::fs::read_dir(dir)
                .await
                .map_err(|e| SyslogPipelineError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory: {e}"),
                })?;

        let mut rules: Vec<Rule> = Vec::new();

        while let Some(entry) =
            entries
                .next_entry()
                .await
                .map_err(|e| SyslogPipelineError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory entry: {e}"),
                })?
        {
            let path = entry.path();

            // .yml / .yaml 확장자만 처리
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if !is_yaml {
                continue;
            }

            match Self::load_file(&path).await {
                Ok(rule) => {
                    // 중복 id 검사
                    if rules.iter().any(|r| r.id == rule.id) {
                        tracing::warn!(
                            rule_id = rule.id,
                            path = %path.display(),
                            "duplicate rule id, skipping"
                        );
                        continue;
                    }
                    rules.push(rule);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load rule file, skipping"
                    );
                }
            }

            if rules.len() > MAX_RULES_COUNT {
                return Err(SyslogPipelineError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("too many rules (max: {MAX_RULES_COUNT})"),
                });
            }
        }

        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    /// 단일 YAML 규칙 파일을 로드합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Rule, SyslogPipelineError> {
        let path = path.as_ref();

        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| SyslogPipelineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to stat file: {e}"),
            })?;

        if meta.len() > MAX_RULE_FILE_SIZE {
            return Err(SyslogPipelineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                    meta.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| SyslogPipelineError::RuleLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        let rule: Rule =
            serde_yaml::from_str(&content).map_err(|e| SyslogPipelineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("invalid rule YAML: {e}"),
            })?;

        Ok(rule)
    }
}
