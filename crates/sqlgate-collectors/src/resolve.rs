//! Identifier resolution: from `(collector_id, collector_ref, query_id)` to
//! a concrete `(pack, collector, query)`.
//!
//! `collector_ref` is `<pack_id>:<collector_id>` and always wins when it
//! resolves. A bare `collector_id` must be unambiguous across the matching
//! packs; duplicates are reported, never silently picked.

use std::sync::Arc;

use itertools::Itertools as _;
use sqlgate_error::{ErrorCode, GateResult, err};

use crate::schema::{CollectorDefinition, CollectorPack, QueryConfig};

#[derive(Debug, Clone)]
pub struct ResolvedCollector {
    pub pack: Arc<CollectorPack>,
    pub collector_id: String,
}

impl ResolvedCollector {
    pub fn definition(&self) -> &CollectorDefinition {
        &self.pack.collectors[&self.collector_id]
    }

    /// The identifier to use in messages: the fully qualified ref.
    pub fn collector_ref(&self) -> String {
        format!("{}:{}", self.pack.pack_id(), self.collector_id)
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedQuery {
    pub collector: ResolvedCollector,
    pub query_id: String,
}

impl ResolvedQuery {
    pub fn config(&self) -> &QueryConfig {
        &self.collector.definition().queries[&self.query_id]
    }
}

fn split_collector_ref(collector_ref: &str) -> GateResult<(&str, &str)> {
    match collector_ref.split_once(':') {
        Some((pack_id, collector_id)) if !pack_id.is_empty() && !collector_id.is_empty() => {
            Ok((pack_id, collector_id))
        }
        _ => err!(
            ErrorCode::InvalidArgument,
            "malformed collector_ref '{collector_ref}': expected '<pack_id>:<collector_id>'"
        ),
    }
}

/// Resolve a collector within the packs matching the connected server.
pub fn resolve_collector(
    packs: &[Arc<CollectorPack>],
    db_type: &str,
    collector_id: Option<&str>,
    collector_ref: Option<&str>,
) -> GateResult<ResolvedCollector> {
    if packs.is_empty() {
        return err!(
            ErrorCode::CollectorNotFound,
            "no collector packs available for db_type '{db_type}'"
        );
    }

    if let Some(collector_ref) = collector_ref.filter(|r| !r.trim().is_empty()) {
        let (pack_id, ref_collector_id) = split_collector_ref(collector_ref)?;
        let pack = packs.iter().find(|pack| pack.pack_id() == pack_id);
        match pack {
            Some(pack) if pack.collectors.contains_key(ref_collector_id) => {
                return Ok(ResolvedCollector {
                    pack: pack.clone(),
                    collector_id: ref_collector_id.to_string(),
                });
            }
            // The ref did not resolve. When a bare collector_id was also
            // supplied, fall through to id-based resolution (the source
            // system behaves this way); otherwise report the miss.
            _ if collector_id.is_some_and(|id| !id.trim().is_empty()) => {}
            _ => {
                return err!(
                    ErrorCode::CollectorNotFound,
                    "collector_ref '{collector_ref}' not found for db_type '{db_type}'"
                );
            }
        }
    }

    let Some(collector_id) = collector_id.filter(|id| !id.trim().is_empty()) else {
        return err!(
            ErrorCode::InvalidArgument,
            "either collector_id or collector_ref is required"
        );
    };

    let hits: Vec<&Arc<CollectorPack>> = packs
        .iter()
        .filter(|pack| pack.collectors.contains_key(collector_id))
        .collect();
    match hits.len() {
        0 => err!(
            ErrorCode::CollectorNotFound,
            "collector '{collector_id}' not found for db_type '{db_type}'"
        ),
        1 => Ok(ResolvedCollector {
            pack: hits[0].clone(),
            collector_id: collector_id.to_string(),
        }),
        _ => {
            let candidates = hits.iter().map(|pack| pack.source_file.as_str()).join(", ");
            err!(
                ErrorCode::CollectorAmbiguous,
                "collector '{collector_id}' is defined in multiple packs [{candidates}]; \
                 disambiguate with collector_ref '<pack_id>:{collector_id}'"
            )
        }
    }
}

/// Resolve a query. With a collector identifier, the query is looked up
/// inside the resolved collector; with only a `query_id`, every collector of
/// every matching pack is scanned and the hit must be unique.
pub fn resolve_query(
    packs: &[Arc<CollectorPack>],
    db_type: &str,
    collector_id: Option<&str>,
    collector_ref: Option<&str>,
    query_id: &str,
) -> GateResult<ResolvedQuery> {
    if query_id.trim().is_empty() {
        return err!(ErrorCode::InvalidArgument, "query_id must not be blank");
    }

    let has_collector_hint = collector_id.is_some_and(|id| !id.trim().is_empty())
        || collector_ref.is_some_and(|r| !r.trim().is_empty());
    if has_collector_hint {
        let collector = resolve_collector(packs, db_type, collector_id, collector_ref)?;
        if !collector.definition().queries.contains_key(query_id) {
            return err!(
                ErrorCode::QueryNotFound,
                "query '{query_id}' not found in collector '{}'",
                collector.collector_ref()
            );
        }
        return Ok(ResolvedQuery {
            collector,
            query_id: query_id.to_string(),
        });
    }

    if packs.is_empty() {
        return err!(
            ErrorCode::CollectorNotFound,
            "no collector packs available for db_type '{db_type}'"
        );
    }

    let mut hits: Vec<ResolvedCollector> = Vec::new();
    for pack in packs {
        for (candidate_id, definition) in &pack.collectors {
            if definition.queries.contains_key(query_id) {
                hits.push(ResolvedCollector {
                    pack: pack.clone(),
                    collector_id: candidate_id.clone(),
                });
            }
        }
    }
    match hits.len() {
        0 => err!(
            ErrorCode::QueryNotFound,
            "query '{query_id}' not found in any collector for db_type '{db_type}'"
        ),
        1 => Ok(ResolvedQuery {
            collector: hits.remove(0),
            query_id: query_id.to_string(),
        }),
        _ => {
            let candidates = hits.iter().map(|hit| hit.collector_ref()).join(", ");
            err!(
                ErrorCode::CollectorAmbiguous,
                "query '{query_id}' is defined in multiple collectors [{candidates}]; \
                 disambiguate with collector_id or collector_ref"
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LayerConfig, SupportedVersions};
    use std::collections::BTreeMap;

    fn pack(source_file: &str, collectors: &[(&str, &[&str])]) -> Arc<CollectorPack> {
        let collectors = collectors
            .iter()
            .map(|(collector_id, query_ids)| {
                let queries = query_ids
                    .iter()
                    .map(|query_id| {
                        (
                            query_id.to_string(),
                            QueryConfig {
                                description: None,
                                sql: format!("SELECT '{query_id}'"),
                                single_row: None,
                            },
                        )
                    })
                    .collect();
                (
                    collector_id.to_string(),
                    CollectorDefinition {
                        layers: BTreeMap::<String, LayerConfig>::new(),
                        queries,
                    },
                )
            })
            .collect();
        Arc::new(CollectorPack {
            db_type: "postgres".to_string(),
            source_file: source_file.to_string(),
            supported_versions: SupportedVersions {
                min: "0".to_string(),
                max: "999".to_string(),
            },
            collectors,
        })
    }

    #[test]
    fn test_unique_collector_id_resolves() {
        let packs = vec![pack("top-a.yaml", &[("top", &["q1"])])];
        let resolved = resolve_collector(&packs, "postgres", Some("top"), None).unwrap();
        assert_eq!(resolved.pack.source_file, "top-a.yaml");
        assert_eq!(resolved.collector_ref(), "top-a:top");
    }

    #[test]
    fn test_duplicate_collector_id_is_ambiguous() {
        let packs = vec![
            pack("top-a.yaml", &[("top", &["q1"])]),
            pack("top-b.yaml", &[("top", &["q2"])]),
        ];
        let err = resolve_collector(&packs, "postgres", Some("top"), None).unwrap_err();
        assert_eq!(err.code, ErrorCode::CollectorAmbiguous);
        assert!(err.context.contains("top-a.yaml"));
        assert!(err.context.contains("top-b.yaml"));

        // A qualified ref resolves the tie.
        let resolved =
            resolve_collector(&packs, "postgres", None, Some("top-a:top")).unwrap();
        assert_eq!(resolved.pack.source_file, "top-a.yaml");
    }

    #[test]
    fn test_ref_miss_falls_back_to_id_when_both_given() {
        let packs = vec![pack("top-a.yaml", &[("top", &["q1"])])];
        let resolved =
            resolve_collector(&packs, "postgres", Some("top"), Some("gone:top")).unwrap();
        assert_eq!(resolved.collector_id, "top");

        let err = resolve_collector(&packs, "postgres", None, Some("gone:top")).unwrap_err();
        assert_eq!(err.code, ErrorCode::CollectorNotFound);
    }

    #[test]
    fn test_malformed_ref_is_invalid_argument() {
        let packs = vec![pack("top-a.yaml", &[("top", &["q1"])])];
        let err = resolve_collector(&packs, "postgres", None, Some("no-colon")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_no_identifiers_is_invalid_argument() {
        let packs = vec![pack("top-a.yaml", &[("top", &["q1"])])];
        let err = resolve_collector(&packs, "postgres", None, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_empty_packs_is_not_found() {
        let err = resolve_collector(&[], "postgres", Some("top"), None).unwrap_err();
        assert_eq!(err.code, ErrorCode::CollectorNotFound);
    }

    #[test]
    fn test_query_shorthand_unique_hit() {
        let packs = vec![
            pack("top-a.yaml", &[("top", &["sessions"]), ("checks", &["locks"])]),
            pack("top-b.yaml", &[("other", &["waits"])]),
        ];
        let resolved = resolve_query(&packs, "postgres", None, None, "locks").unwrap();
        assert_eq!(resolved.collector.collector_id, "checks");
        assert_eq!(resolved.query_id, "locks");
    }

    #[test]
    fn test_query_shorthand_ambiguous() {
        let packs = vec![
            pack("top-a.yaml", &[("top", &["sessions"])]),
            pack("top-b.yaml", &[("other", &["sessions"])]),
        ];
        let err = resolve_query(&packs, "postgres", None, None, "sessions").unwrap_err();
        assert_eq!(err.code, ErrorCode::CollectorAmbiguous);
        assert!(err.context.contains("top-a:top"));
        assert!(err.context.contains("top-b:other"));
    }

    #[test]
    fn test_query_missing_in_resolved_collector() {
        let packs = vec![pack("top-a.yaml", &[("top", &["sessions"])])];
        let err = resolve_query(&packs, "postgres", Some("top"), None, "gone").unwrap_err();
        assert_eq!(err.code, ErrorCode::QueryNotFound);
    }
}
