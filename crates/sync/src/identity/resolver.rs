//! Frontend id -> backend id resolution.
//!
//! Resolution runs an ordered list of [`ResolveStrategy`]s; the first hit wins
//! and is cached. The worker list is fetched lazily, only when the first
//! strategy that needs it is reached. If nothing matches, or the fetch
//! fails, the frontend id itself is returned so callers can still proceed.

use std::sync::Arc;

use workerdesk_core::{BackendId, FrontendId, RawWorker, name_slug, overlaps, phone_digits};

use super::store::IdentityStore;
use crate::client::WorkerApi;

/// Inputs available to a strategy.
pub struct ResolveContext<'a> {
    pub frontend_id: &'a FrontendId,
    pub store: &'a IdentityStore,
    /// Freshly fetched list; `None` until a roster strategy is reached.
    pub roster: Option<&'a [RawWorker]>,
}

impl ResolveContext<'_> {
    fn roster(&self) -> &[RawWorker] {
        self.roster.unwrap_or(&[])
    }

    /// Backend id of the roster entry at `index`.
    fn backend_at(&self, index: usize) -> Option<BackendId> {
        self.roster()
            .get(index)
            .map(|raw| raw.backend_id().unwrap_or_else(|| BackendId::from_position(index)))
    }

    fn find(&self, pred: impl Fn(&RawWorker) -> bool) -> Option<BackendId> {
        let index = self.roster().iter().position(pred)?;
        self.backend_at(index)
    }
}

/// One step of the resolution cascade.
pub trait ResolveStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this step reads the fetched worker list.
    fn needs_roster(&self) -> bool {
        false
    }

    fn try_resolve(&self, ctx: &ResolveContext<'_>) -> Option<BackendId>;
}

/// Seed worker whose name key occurs in the frontend id.
pub struct SeedNameShortcut;

impl ResolveStrategy for SeedNameShortcut {
    fn name(&self) -> &'static str {
        "seed-name"
    }

    fn try_resolve(&self, ctx: &ResolveContext<'_>) -> Option<BackendId> {
        ctx.store
            .seed_matching(ctx.frontend_id.as_str())
            .map(|seed| seed.backend_id())
    }
}

/// Previously cached mapping.
pub struct CachedMapping;

impl ResolveStrategy for CachedMapping {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn try_resolve(&self, ctx: &ResolveContext<'_>) -> Option<BackendId> {
        ctx.store.backend_for(ctx.frontend_id.as_str())
    }
}

/// A roster entry whose own id equals the frontend id.
pub struct ExactBackendId;

impl ResolveStrategy for ExactBackendId {
    fn name(&self) -> &'static str {
        "exact-id"
    }

    fn needs_roster(&self) -> bool {
        true
    }

    fn try_resolve(&self, ctx: &ResolveContext<'_>) -> Option<BackendId> {
        let wanted = ctx.frontend_id.as_str();
        ctx.roster()
            .iter()
            .filter_map(RawWorker::backend_id)
            .find(|id| id.as_str() == wanted)
    }
}

/// Roster name overlapping the name part (before the first `_`) of the id.
pub struct NameMatch;

impl ResolveStrategy for NameMatch {
    fn name(&self) -> &'static str {
        "name"
    }

    fn needs_roster(&self) -> bool {
        true
    }

    fn try_resolve(&self, ctx: &ResolveContext<'_>) -> Option<BackendId> {
        let id = ctx.frontend_id.as_str();
        let name_part = name_slug(id.split('_').next().unwrap_or(id));
        ctx.find(|raw| overlaps(&name_slug(raw.name_or_empty()), &name_part))
    }
}

/// Roster phone overlapping the digits of the id.
pub struct PhoneMatch;

impl ResolveStrategy for PhoneMatch {
    fn name(&self) -> &'static str {
        "phone"
    }

    fn needs_roster(&self) -> bool {
        true
    }

    fn try_resolve(&self, ctx: &ResolveContext<'_>) -> Option<BackendId> {
        let digits = phone_digits(ctx.frontend_id.as_str());
        ctx.find(|raw| overlaps(&phone_digits(raw.phone_or_empty()), &digits))
    }
}

/// Digits of the id read as a 1-based list position.
pub struct Positional;

impl ResolveStrategy for Positional {
    fn name(&self) -> &'static str {
        "position"
    }

    fn needs_roster(&self) -> bool {
        true
    }

    fn try_resolve(&self, ctx: &ResolveContext<'_>) -> Option<BackendId> {
        let k: usize = phone_digits(ctx.frontend_id.as_str()).parse().ok()?;
        if k == 0 || k > ctx.roster().len() {
            return None;
        }
        ctx.backend_at(k - 1)
    }
}

/// Marker placed after the fetch: re-checks seed names once the list is known.
struct SeedNameAfterFetch;

impl ResolveStrategy for SeedNameAfterFetch {
    fn name(&self) -> &'static str {
        "seed-name-after-fetch"
    }

    fn needs_roster(&self) -> bool {
        true
    }

    fn try_resolve(&self, ctx: &ResolveContext<'_>) -> Option<BackendId> {
        SeedNameShortcut.try_resolve(ctx)
    }
}

/// The standard cascade, in priority order.
pub fn default_strategies() -> Vec<Box<dyn ResolveStrategy>> {
    vec![
        Box::new(SeedNameShortcut),
        Box::new(CachedMapping),
        Box::new(ExactBackendId),
        Box::new(NameMatch),
        Box::new(PhoneMatch),
        Box::new(SeedNameAfterFetch),
        Box::new(Positional),
    ]
}

/// Resolves frontend ids against the identity store and, when needed, the backend.
pub struct IdentityResolver {
    api: Arc<dyn WorkerApi>,
    store: Arc<IdentityStore>,
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl IdentityResolver {
    pub fn new(api: Arc<dyn WorkerApi>, store: Arc<IdentityStore>) -> Self {
        Self::with_strategies(api, store, default_strategies())
    }

    pub fn with_strategies(
        api: Arc<dyn WorkerApi>,
        store: Arc<IdentityStore>,
        strategies: Vec<Box<dyn ResolveStrategy>>,
    ) -> Self {
        Self {
            api,
            store,
            strategies,
        }
    }

    pub fn store(&self) -> &Arc<IdentityStore> {
        &self.store
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Current backend id for `frontend_id`. Never fails; see module docs.
    pub async fn resolve(&self, frontend_id: &FrontendId) -> BackendId {
        let mut roster: Option<Vec<RawWorker>> = None;

        for strategy in &self.strategies {
            if strategy.needs_roster() && roster.is_none() {
                match self.api.list_workers().await {
                    Ok(list) => roster = Some(list),
                    Err(e) => {
                        tracing::warn!(
                            "could not fetch workers to resolve {}: {}; using it as the backend id",
                            frontend_id,
                            e
                        );
                        return fallback(frontend_id);
                    }
                }
            }

            let ctx = ResolveContext {
                frontend_id,
                store: &self.store,
                roster: roster.as_deref(),
            };
            if let Some(backend_id) = strategy.try_resolve(&ctx) {
                tracing::debug!(
                    "resolved {} -> {} via {}",
                    frontend_id,
                    backend_id,
                    strategy.name()
                );
                self.store
                    .remember_backend(frontend_id.as_str(), backend_id.clone());
                return backend_id;
            }
        }

        tracing::warn!(
            "no backend id found for {}; using it as the backend id",
            frontend_id
        );
        fallback(frontend_id)
    }
}

fn fallback(frontend_id: &FrontendId) -> BackendId {
    BackendId::new(frontend_id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::derive::derive_frontend_id;
    use crate::testing::{ScriptedApi, raw};

    fn resolver(api: Arc<ScriptedApi>) -> IdentityResolver {
        IdentityResolver::new(api, Arc::new(IdentityStore::new()))
    }

    #[tokio::test]
    async fn seed_shortcut_needs_no_network() {
        let api = Arc::new(ScriptedApi::offline());
        let resolver = resolver(api.clone());

        let id = derive_frontend_id(resolver.store(), &raw(Some("1"), "String", "2345678"), None);
        assert_eq!(id.as_str(), "string_2345678");
        assert_eq!(resolver.resolve(&id).await, BackendId::new("1"));
        assert_eq!(api.list_calls(), 0);
    }

    #[tokio::test]
    async fn cache_hit_skips_fetch() {
        let api = Arc::new(ScriptedApi::with_roster(vec![]));
        let resolver = resolver(api.clone());
        resolver
            .store()
            .remember_backend("meena_5550007", BackendId::new("31"));

        assert_eq!(
            resolver.resolve(&FrontendId::new("meena_5550007")).await,
            BackendId::new("31")
        );
        assert_eq!(api.list_calls(), 0);
    }

    #[tokio::test]
    async fn round_trip_through_derivation() {
        let roster: Vec<RawWorker> = (0..6)
            .map(|i| {
                let id = if i == 5 { 7 } else { 100 + i };
                raw(
                    Some(&id.to_string()),
                    &format!("Worker{}", i),
                    &format!("55500{:02}", i),
                )
            })
            .collect();
        let api = Arc::new(ScriptedApi::with_roster(roster.clone()));
        let resolver = resolver(api);

        let id = derive_frontend_id(resolver.store(), &roster[5], Some(5));
        assert_eq!(resolver.resolve(&id).await, BackendId::new("7"));
    }

    #[tokio::test]
    async fn exact_backend_id_match() {
        let api = Arc::new(ScriptedApi::with_roster(vec![
            raw(Some("15"), "Meena", "5550007"),
            raw(Some("16"), "Kiran", "5550008"),
        ]));
        let resolver = resolver(api);

        assert_eq!(
            resolver.resolve(&FrontendId::new("16")).await,
            BackendId::new("16")
        );
    }

    #[tokio::test]
    async fn name_then_phone_matching() {
        let api = Arc::new(ScriptedApi::with_roster(vec![
            raw(Some("20"), "Meena Iyer", "5550007"),
            raw(Some("21"), "Kiran", "5550008"),
        ]));
        let resolver = resolver(api.clone());

        // Name part "meena" is contained in "meenaiyer".
        assert_eq!(
            resolver.resolve(&FrontendId::new("meena_0000000")).await,
            BackendId::new("20")
        );
        // No name overlap; phone digits match the second record.
        assert_eq!(
            resolver.resolve(&FrontendId::new("x_5550008")).await,
            BackendId::new("21")
        );
        // Both results are cached.
        assert_eq!(
            resolver.store().backend_for("x_5550008"),
            Some(BackendId::new("21"))
        );
    }

    #[tokio::test]
    async fn positional_fallback() {
        let api = Arc::new(ScriptedApi::with_roster(vec![
            raw(Some("50"), "Meena", "5550007"),
            raw(None, "Kiran", "5550008"),
        ]));
        let resolver = resolver(api);

        assert_eq!(
            resolver.resolve(&FrontendId::new("#1")).await,
            BackendId::new("50")
        );
        assert_eq!(
            resolver.resolve(&FrontendId::new("#2")).await,
            BackendId::new("2")
        );
    }

    #[tokio::test]
    async fn unresolvable_returns_input() {
        let api = Arc::new(ScriptedApi::with_roster(vec![raw(
            Some("50"),
            "Meena",
            "5550007",
        )]));
        let resolver = resolver(api);

        let id = FrontendId::new("zzz_9");
        assert_eq!(resolver.resolve(&id).await, BackendId::new("zzz_9"));
        assert_eq!(resolver.store().backend_for("zzz_9"), None);
    }

    #[tokio::test]
    async fn fetch_failure_returns_input() {
        let api = Arc::new(ScriptedApi::offline());
        let resolver = resolver(api.clone());

        let id = FrontendId::new("meena_5550007");
        assert_eq!(resolver.resolve(&id).await, BackendId::new("meena_5550007"));
        assert_eq!(api.list_calls(), 1);
    }

    #[test]
    fn default_cascade_order() {
        let api = Arc::new(ScriptedApi::with_roster(vec![]));
        assert_eq!(
            resolver(api).strategy_names(),
            vec![
                "seed-name",
                "cache",
                "exact-id",
                "name",
                "phone",
                "seed-name-after-fetch",
                "position"
            ]
        );
    }
}
