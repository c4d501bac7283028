use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::{
    AmbientAdapter, EcowittAdapter, FederatedAdapter, MetarAdapter, MetarTextAdapter, NwsAdapter,
    OpenMeteoAdapter, PwsWeatherAdapter, SwobAdapter, SynopticDataAdapter, TempestAdapter,
    WeatherLinkAdapter,
};
use crate::data_source::{SourceCapabilities, WeatherSource};
use crate::SourceKind;

/// Adapter lookup by configured source type.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<SourceKind, Arc<dyn WeatherSource>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(TempestAdapter),
            Arc::new(AmbientAdapter),
            Arc::new(WeatherLinkAdapter),
            Arc::new(PwsWeatherAdapter),
            Arc::new(SynopticDataAdapter),
            Arc::new(MetarAdapter),
            Arc::new(MetarTextAdapter),
            Arc::new(NwsAdapter),
            Arc::new(SwobAdapter),
            Arc::new(OpenMeteoAdapter),
            Arc::new(EcowittAdapter),
            Arc::new(FederatedAdapter),
        ])
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl AdapterRegistry {
    /// Later registrations for the same kind replace earlier ones.
    pub fn new(adapters: Vec<Arc<dyn WeatherSource>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.kind(), adapter))
            .collect();
        Self { adapters }
    }

    /// Resolves a configured `type` string. Matching ignores case and treats
    /// `-` like `_`.
    pub fn get(&self, source_type: &str) -> Option<Arc<dyn WeatherSource>> {
        let kind = source_type.parse::<SourceKind>().ok()?;
        self.get_kind(kind)
    }

    pub fn get_kind(&self, kind: SourceKind) -> Option<Arc<dyn WeatherSource>> {
        self.adapters.get(&kind).cloned()
    }

    /// Registered kinds in canonical order.
    pub fn kinds(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| self.adapters.contains_key(kind))
            .collect()
    }

    pub fn capabilities(&self) -> Vec<SourceCapabilities> {
        self.kinds()
            .into_iter()
            .filter_map(|kind| self.adapters.get(&kind))
            .map(|adapter| adapter.capabilities())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
