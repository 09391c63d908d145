//! Application classification.
//!
//! Answers two questions about an opaque application identifier:
//! - is it the host itself or an operating-system component, and
//! - is it a home/launcher surface.
//!
//! Membership comes from a hand-curated seed catalog unioned with whatever
//! the platform can enumerate. Seeds are a floor, never replaced: on hosts
//! that restrict application enumeration the catalog stands alone, which is
//! why it is deliberately generous. Rebuilds publish a fresh set atomically
//! so the resolution path never observes a partial union.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::AppId;

/// Core OS/UI identifiers that must never be treated as foreign.
const SYSTEM_SEED: &[&str] = &[
    "android",
    "com.android.systemui",
    "com.android.settings",
    "com.android.phone",
    "com.android.intentresolver",
    "com.android.permissioncontroller",
    "com.google.android.gms",
    "com.google.android.packageinstaller",
];

/// Known home-screen applications across common device vendors.
const LAUNCHER_SEED: &[&str] = &[
    "com.android.launcher",
    "com.android.launcher3",
    "com.google.android.apps.nexuslauncher",
    "com.sec.android.app.launcher",
    "com.miui.home",
    "com.hihonor.android.launcher",
    "com.huawei.android.launcher",
    "com.oppo.launcher",
    "com.vivo.launcher",
    "net.oneplus.launcher",
];

/// Identifier of the system shell itself.
const SYSTEM_SHELL: &str = "com.android.systemui";

/// Hand-curated identifier lists the classifier starts from.
///
/// Serde-loadable so hosts on differently flavored platforms can replace
/// the catalog wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedCatalog {
    #[serde(default = "default_system_seed")]
    pub system: Vec<AppId>,
    #[serde(default = "default_launcher_seed")]
    pub launchers: Vec<AppId>,
    #[serde(default = "default_system_shell")]
    pub system_shell: AppId,
}

fn default_system_seed() -> Vec<AppId> {
    SYSTEM_SEED.iter().map(|s| s.to_string()).collect()
}

fn default_launcher_seed() -> Vec<AppId> {
    LAUNCHER_SEED.iter().map(|s| s.to_string()).collect()
}

fn default_system_shell() -> AppId {
    SYSTEM_SHELL.to_string()
}

impl Default for SeedCatalog {
    fn default() -> Self {
        Self {
            system: default_system_seed(),
            launchers: default_launcher_seed(),
            system_shell: default_system_shell(),
        }
    }
}

/// One published classification epoch: seed sets unioned with whatever the
/// platform reported at the last rebuild.
#[derive(Debug, Clone, Default)]
pub struct ClassificationSets {
    system: HashSet<AppId>,
    home: HashSet<AppId>,
}

impl ClassificationSets {
    /// Sets containing only the seed catalog.
    pub fn seeded(catalog: &SeedCatalog) -> Self {
        let mut system: HashSet<AppId> = catalog.system.iter().cloned().collect();
        system.insert(catalog.system_shell.clone());
        let home = catalog.launchers.iter().cloned().collect();
        Self { system, home }
    }

    pub fn contains_system(&self, id: &str) -> bool {
        self.system.contains(id)
    }

    pub fn contains_home(&self, id: &str) -> bool {
        self.home.contains(id)
    }

    pub fn system_len(&self) -> usize {
        self.system.len()
    }

    pub fn home_len(&self) -> usize {
        self.home.len()
    }
}

/// Classifies application identifiers against the published sets.
///
/// `rebuild` may run concurrently with reads; publication swaps one
/// reference, so readers see either the old epoch or the new one.
pub struct Classifier {
    self_id: AppId,
    catalog: SeedCatalog,
    platform: Arc<dyn Platform>,
    sets: RwLock<Arc<ClassificationSets>>,
}

impl Classifier {
    /// Starts from seeds only; call `rebuild` to fold in platform state.
    pub fn new(self_id: AppId, catalog: SeedCatalog, platform: Arc<dyn Platform>) -> Self {
        let sets = Arc::new(ClassificationSets::seeded(&catalog));
        Self {
            self_id,
            catalog,
            platform,
            sets: RwLock::new(sets),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn self_id(&self) -> &AppId {
        &self.self_id
    }

    pub fn system_shell(&self) -> &AppId {
        &self.catalog.system_shell
    }

    /// Current classification epoch.
    pub fn sets(&self) -> Arc<ClassificationSets> {
        let guard = self.sets.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// True for the host itself and for operating-system components.
    ///
    /// A metadata lookup failure means "not system": an identifier that
    /// cannot be resolved anymore is most likely already uninstalled.
    pub fn is_self_or_system(&self, id: &str) -> bool {
        if self.self_id == id {
            return true;
        }
        if self.sets().contains_system(id) {
            return true;
        }
        self.platform
            .app_metadata(id)
            .map(|m| m.system || m.updated_system)
            .unwrap_or(false)
    }

    /// True for home/launcher surfaces.
    ///
    /// The substring heuristic is intentionally permissive: a false
    /// positive merely fails to block a launcher-shell.
    pub fn is_home_surface(&self, id: &str) -> bool {
        self.sets().contains_home(id) || id.to_ascii_lowercase().contains("launcher")
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Rebuild the classification sets from seeds plus platform state and
    /// publish them atomically. Returns the published set sizes.
    pub fn rebuild(&self) -> (usize, usize) {
        let mut next = ClassificationSets::seeded(&self.catalog);

        for id in self.platform.home_handlers() {
            next.home.insert(id);
        }

        match self.platform.installed_apps() {
            Some(apps) => {
                for id in apps {
                    let is_system = self
                        .platform
                        .app_metadata(&id)
                        .map(|m| m.system || m.updated_system)
                        .unwrap_or(false);
                    if is_system {
                        next.system.insert(id);
                    }
                }
            }
            None => {
                tracing::warn!("application enumeration restricted, relying on seed catalog");
            }
        }

        let sizes = (next.system_len(), next.home_len());
        let mut guard = self.sets.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(next);
        sizes
    }
}
