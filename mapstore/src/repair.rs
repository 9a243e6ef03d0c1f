//! Background collapse of redundant redirect chains.
//!
//! A chain `D -> C -> A` where `C` is a 3xx and `A` is a terminal (200 or
//! gone) is rewritten to `D -> A`, preserving `A`'s status code as the
//! eventual outcome. Only exactly two-hop chains are collapsed per pass;
//! longer chains converge one hop per scheduled run. Chains are tolerated at
//! write time (a valid transient state during migrations) and shortened here
//! instead of rejected.

use std::sync::Arc;
use std::time::SystemTime;

use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::metrics_defs::{REPAIR_COLLAPSED, REPAIR_FAILED};
use crate::service::MapService;
use crate::store::{Store, StoreError};
use shared::counter;

/// System identity audit entries are attributed to, created on first use.
pub const REPAIR_ACTOR_NAME: &str = "redirect_repair";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepairSummary {
    pub examined: usize,
    pub collapsed: usize,
    pub failed: usize,
}

pub struct RedirectChainRepair {
    maps: Arc<MapService>,
    audit: Arc<dyn AuditSink>,
}

impl RedirectChainRepair {
    pub fn new(maps: Arc<MapService>, audit: Arc<dyn AuditSink>) -> Self {
        RedirectChainRepair { maps, audit }
    }

    /// One repair pass. Idempotent: a second run over a stable graph writes
    /// nothing. A failure on one row does not abort the rest of the batch;
    /// each rewrite is its own atomic store write.
    pub async fn run(&self) -> Result<RepairSummary, StoreError> {
        let actor = self.audit.ensure_actor(REPAIR_ACTOR_NAME);
        let heads = self.maps.store().two_hop_redirects().await?;
        let mut summary = RepairSummary::default();

        for mut head in heads {
            summary.examined += 1;

            // Re-read the chain fresh; the graph may have moved since the
            // detection query.
            let Some(middle_id) = head.redirect else {
                continue;
            };
            let Ok(middle) = self.maps.store().url_map(middle_id).await else {
                continue;
            };
            if !middle.is_redirect() {
                continue;
            }
            let Some(terminal_id) = middle.redirect else {
                continue;
            };
            let Ok(terminal) = self.maps.store().url_map(terminal_id).await else {
                continue;
            };
            if !terminal.is_terminal() {
                continue;
            }

            let head_path = head.path.clone();
            head.redirect = Some(terminal_id);
            head.on_sitemap = false;
            match self.maps.save_url_map(head).await {
                Ok(saved) => {
                    if let Some(id) = saved.id {
                        self.audit.append(AuditEntry {
                            actor: actor.clone(),
                            url_map: id,
                            action: AuditAction::Change,
                            message: format!(
                                "Updated to redirect directly to \"{}\" by RedirectChainRepair",
                                terminal.path
                            ),
                            at: SystemTime::now(),
                        });
                    }
                    counter!(REPAIR_COLLAPSED).increment(1);
                    summary.collapsed += 1;
                    tracing::info!(
                        path = %saved.path,
                        target = %terminal.path,
                        "collapsed redirect chain"
                    );
                }
                Err(error) => {
                    counter!(REPAIR_FAILED).increment(1);
                    summary.failed += 1;
                    tracing::warn!(
                        path = %head_path,
                        error = %error,
                        "failed to collapse redirect chain"
                    );
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::entities::{ContentMap, UrlMap, UrlMapId};
    use crate::testutils::{TestEnv, test_env, test_site_id};

    async fn make_map(
        env: &TestEnv,
        path: &str,
        status_code: u16,
        redirect: Option<UrlMapId>,
        content_map: bool,
    ) -> UrlMap {
        let mut map = UrlMap::new(test_site_id(), path);
        map.status_code = status_code;
        map.redirect = redirect;
        if content_map {
            let cm = env
                .service
                .save_content_map(ContentMap::new("page"))
                .await
                .unwrap();
            map.content_map = cm.id;
        }
        env.service.save_url_map(map).await.unwrap()
    }

    /// The original scenario:
    ///
    /// A: 200
    /// B: 410
    /// C -> A
    /// D -> C -> A
    /// E -> B
    /// F -> D -> C -> A
    /// G -> E -> B
    async fn seed_graph(env: &TestEnv) -> (UrlMap, UrlMap, UrlMap, UrlMap, UrlMap) {
        let a = make_map(env, "/a/", 200, None, true).await;
        let b = make_map(env, "/b/", 410, None, false).await;
        let c = make_map(env, "/c/", 301, a.id, false).await;
        let d = make_map(env, "/d/", 301, c.id, false).await;
        let e = make_map(env, "/e/", 301, b.id, false).await;
        let f = make_map(env, "/f/", 302, d.id, false).await;
        let g = make_map(env, "/g/", 302, e.id, false).await;
        (a, b, d, f, g)
    }

    fn repair(env: &TestEnv, audit: &MemoryAuditSink) -> RedirectChainRepair {
        RedirectChainRepair::new(env.service.clone(), Arc::new(audit.clone()))
    }

    #[tokio::test]
    async fn test_two_hop_chains_collapse() {
        let env = test_env().await;
        let audit = MemoryAuditSink::new();
        let (a, b, d, _f, g) = seed_graph(&env).await;

        let summary = repair(&env, &audit).run().await.unwrap();
        assert_eq!(summary.collapsed, 2);
        assert_eq!(summary.failed, 0);

        let updated_d = env.store.url_map(d.id.unwrap()).await.unwrap();
        assert_eq!(updated_d.redirect, a.id);
        assert!(!updated_d.on_sitemap);
        let updated_g = env.store.url_map(g.id.unwrap()).await.unwrap();
        assert_eq!(updated_g.redirect, b.id);
        assert!(!updated_g.on_sitemap);

        let d_entries = audit.entries_for(d.id.unwrap());
        assert_eq!(d_entries.len(), 1);
        assert_eq!(d_entries[0].actor.name, REPAIR_ACTOR_NAME);
        assert_eq!(
            d_entries[0].message,
            "Updated to redirect directly to \"/a/\" by RedirectChainRepair"
        );
        let g_entries = audit.entries_for(g.id.unwrap());
        assert_eq!(
            g_entries[0].message,
            "Updated to redirect directly to \"/b/\" by RedirectChainRepair"
        );
    }

    #[tokio::test]
    async fn test_stable_graph_second_run_is_noop() {
        let env = test_env().await;
        let audit = MemoryAuditSink::new();
        let a = make_map(&env, "/a/", 200, None, true).await;
        let c = make_map(&env, "/c/", 301, a.id, false).await;
        let d = make_map(&env, "/d/", 301, c.id, false).await;

        let job = repair(&env, &audit);
        let summary = job.run().await.unwrap();
        assert_eq!(summary.collapsed, 1);
        let collapsed_d = env.store.url_map(d.id.unwrap()).await.unwrap();
        assert_eq!(collapsed_d.redirect, a.id);
        let modified_after_first = collapsed_d.modified;

        let summary = job.run().await.unwrap();
        assert_eq!(summary, RepairSummary::default());
        assert_eq!(audit.entries().len(), 1, "no new audit entries");
        let untouched_d = env.store.url_map(d.id.unwrap()).await.unwrap();
        assert_eq!(untouched_d.modified, modified_after_first);
    }

    #[tokio::test]
    async fn test_longer_chains_converge_across_runs() {
        let env = test_env().await;
        let audit = MemoryAuditSink::new();
        let (a, _b, _d, f, _g) = seed_graph(&env).await;

        let job = repair(&env, &audit);
        job.run().await.unwrap();
        // F -> D -> A became a fresh two-hop chain; the next pass takes it
        let summary = job.run().await.unwrap();
        assert_eq!(summary.collapsed, 1);
        let updated_f = env.store.url_map(f.id.unwrap()).await.unwrap();
        assert_eq!(updated_f.redirect, a.id);

        assert_eq!(job.run().await.unwrap(), RepairSummary::default());
    }

    #[tokio::test]
    async fn test_row_failure_does_not_abort_batch() {
        let env = test_env().await;
        let audit = MemoryAuditSink::new();

        // X -> Y -> X: X is a gone terminal that also redirects, so the
        // collapse would rewrite X onto itself and fail validation
        let x = make_map(&env, "/x/", 410, None, false).await;
        let y = make_map(&env, "/y/", 301, x.id, false).await;
        let mut x_loop = env.store.url_map(x.id.unwrap()).await.unwrap();
        x_loop.redirect = y.id;
        let x = env.service.save_url_map(x_loop).await.unwrap();

        // plus a healthy chain that must still collapse
        let a = make_map(&env, "/a/", 200, None, true).await;
        let c = make_map(&env, "/c/", 301, a.id, false).await;
        let d = make_map(&env, "/d/", 301, c.id, false).await;

        let summary = repair(&env, &audit).run().await.unwrap();
        assert_eq!(summary.examined, 2);
        assert_eq!(summary.collapsed, 1);
        assert_eq!(summary.failed, 1);

        let updated_d = env.store.url_map(d.id.unwrap()).await.unwrap();
        assert_eq!(updated_d.redirect, a.id);
        let untouched_x = env.store.url_map(x.id.unwrap()).await.unwrap();
        assert_eq!(untouched_x.redirect, y.id, "failed row left unchanged");
        assert!(audit.entries_for(x.id.unwrap()).is_empty());
    }
}
