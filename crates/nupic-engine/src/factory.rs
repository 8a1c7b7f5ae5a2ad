// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Region type resolution.
//!
//! A type name is either a built-in (`TestNode`) or `<module><sep><Type>`,
//! where the module is found by a [`ModuleLoader`] and registers its types
//! through a [`ModuleRegistrar`]. Specs and loaded modules are cached and
//! shared through `Arc` with every region built from them; [`cleanup`]
//! refuses to run while any of those references is still held.
//!
//! [`cleanup`]: RegionImplFactory::cleanup

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use nupic_config::RuntimeConfig;
use tracing::{debug, info};

use crate::bundle_io::BundleIo;
use crate::parameters::ParameterMap;
use crate::region_impl::{RegionContext, RegionImpl, RegionTypeEntry};
use crate::spec::Spec;
use crate::test_node::TestNode;
use crate::{EngineError, EngineResult};

/// A unit of region types loaded together
pub trait RegionModule: Send + Sync {
    /// Declare the types this module provides
    fn register(&self, registrar: &mut ModuleRegistrar) -> EngineResult<()>;

    /// Called exactly once, when the factory drops the module
    fn unload(&mut self) {}
}

/// Collects the types a module declares
#[derive(Default)]
pub struct ModuleRegistrar {
    entries: Vec<(String, RegionTypeEntry)>,
}

impl ModuleRegistrar {
    pub fn register_type(&mut self, name: &str, entry: RegionTypeEntry) -> EngineResult<()> {
        if self.entries.iter().any(|(n, _)| n == name) {
            return Err(EngineError::DuplicateName(format!("region type '{}'", name)));
        }
        self.entries.push((name.to_string(), entry));
        Ok(())
    }
}

/// Maps module names to paths and paths to loaded modules
pub trait ModuleLoader: Send {
    fn resolve(&self, module_name: &str) -> Option<PathBuf>;

    fn load(&self, path: &Path) -> EngineResult<Box<dyn RegionModule>>;
}

pub struct LoadedModule {
    path: PathBuf,
    module: Box<dyn RegionModule>,
}

impl LoadedModule {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LoadedModule {
    fn drop(&mut self) {
        debug!(target: "nupic-engine", "unloading region module {}", self.path.display());
        self.module.unload();
    }
}

pub type ModuleConstructor = fn() -> Box<dyn RegionModule>;

/// Loader over modules linked into the binary
///
/// A module named `m` resolves to `<first search path>/m` (or `./m`).
pub struct StaticModuleLoader {
    search_paths: Vec<PathBuf>,
    modules: AHashMap<String, ModuleConstructor>,
}

impl StaticModuleLoader {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            modules: AHashMap::new(),
        }
    }

    pub fn with_module(mut self, name: &str, constructor: ModuleConstructor) -> Self {
        self.modules.insert(name.to_string(), constructor);
        self
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn resolve(&self, module_name: &str) -> Option<PathBuf> {
        if !self.modules.contains_key(module_name) {
            return None;
        }
        let base = self
            .search_paths
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("."));
        Some(base.join(module_name))
    }

    fn load(&self, path: &Path) -> EngineResult<Box<dyn RegionModule>> {
        let constructor = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| self.modules.get(n))
            .ok_or_else(|| EngineError::UnknownRegionType(format!("no module at {}", path.display())))?;
        Ok(constructor())
    }
}

/// A freshly built implementation and the shared state it depends on
pub struct CreatedRegion {
    pub implementation: Box<dyn RegionImpl>,
    pub spec: Arc<Spec>,
    pub module: Option<Arc<LoadedModule>>,
}

pub struct RegionImplFactory {
    builtins: AHashMap<String, RegionTypeEntry>,
    /// Full type name -> entry and the path of the module providing it
    module_types: AHashMap<String, (RegionTypeEntry, PathBuf)>,
    spec_cache: AHashMap<String, Arc<Spec>>,
    module_cache: AHashMap<PathBuf, Arc<LoadedModule>>,
    loader: Box<dyn ModuleLoader>,
    separator: char,
}

impl RegionImplFactory {
    pub fn new(config: &RuntimeConfig) -> Self {
        let mut builtins = AHashMap::new();
        builtins.insert(TestNode::TYPE_NAME.to_string(), TestNode::entry());
        Self {
            builtins,
            module_types: AHashMap::new(),
            spec_cache: AHashMap::new(),
            module_cache: AHashMap::new(),
            loader: Box::new(StaticModuleLoader::new(config.module_search_paths.clone())),
            separator: config.module_separator,
        }
    }

    pub fn register_builtin(&mut self, name: &str, entry: RegionTypeEntry) -> EngineResult<()> {
        if name.contains(self.separator) {
            return Err(EngineError::InvalidName(format!(
                "built-in type '{}' contains the module separator '{}'",
                name, self.separator
            )));
        }
        if self.builtins.contains_key(name) {
            return Err(EngineError::DuplicateName(format!("region type '{}'", name)));
        }
        self.builtins.insert(name.to_string(), entry);
        Ok(())
    }

    pub fn set_module_loader(&mut self, loader: Box<dyn ModuleLoader>) {
        self.loader = loader;
    }

    fn resolve(&mut self, type_name: &str) -> EngineResult<(RegionTypeEntry, Option<Arc<LoadedModule>>)> {
        if let Some(entry) = self.builtins.get(type_name) {
            return Ok((*entry, None));
        }
        let unknown = || EngineError::UnknownRegionType(type_name.to_string());

        let (module_name, _) = type_name.split_once(self.separator).ok_or_else(unknown)?;
        if !self.module_types.contains_key(type_name) {
            let path = self.loader.resolve(module_name).ok_or_else(unknown)?;
            if !self.module_cache.contains_key(&path) {
                self.load_module(module_name, path)?;
            }
        }

        let (entry, path) = self.module_types.get(type_name).ok_or_else(unknown)?;
        let module = self.module_cache.get(path).cloned().ok_or_else(unknown)?;
        Ok((*entry, Some(module)))
    }

    fn load_module(&mut self, module_name: &str, path: PathBuf) -> EngineResult<()> {
        let module = self.loader.load(&path)?;
        let mut registrar = ModuleRegistrar::default();
        module.register(&mut registrar)?;
        info!(
            target: "nupic-engine",
            "loaded region module '{}' from {} ({} types)",
            module_name,
            path.display(),
            registrar.entries.len()
        );
        for (short_name, entry) in registrar.entries {
            let full_name = format!("{}{}{}", module_name, self.separator, short_name);
            self.module_types.insert(full_name, (entry, path.clone()));
        }
        self.module_cache.insert(
            path.clone(),
            Arc::new(LoadedModule { path, module }),
        );
        Ok(())
    }

    /// Cached spec for `type_name`, loading it on first use
    pub fn get_spec(&mut self, type_name: &str) -> EngineResult<Arc<Spec>> {
        if let Some(spec) = self.spec_cache.get(type_name) {
            return Ok(Arc::clone(spec));
        }
        let (entry, _) = self.resolve(type_name)?;
        let spec = Arc::new((entry.spec)()?);
        self.spec_cache.insert(type_name.to_string(), Arc::clone(&spec));
        Ok(spec)
    }

    pub fn create(
        &mut self,
        type_name: &str,
        params: &str,
        context: &RegionContext<'_>,
    ) -> EngineResult<CreatedRegion> {
        let (entry, module) = self.resolve(type_name)?;
        let spec = self.get_spec(type_name)?;
        let params = ParameterMap::from_json(params, &spec, type_name)?;
        let implementation = (entry.create)(&params, context).map_err(|e| {
            EngineError::ImplementationConstructionFailed {
                type_name: type_name.to_string(),
                source: Box::new(e),
            }
        })?;
        debug!(target: "nupic-engine", "created {} region '{}'", type_name, context.region_name);
        Ok(CreatedRegion {
            implementation,
            spec,
            module,
        })
    }

    pub fn deserialize(
        &mut self,
        type_name: &str,
        bundle: &mut BundleIo,
        context: &RegionContext<'_>,
    ) -> EngineResult<CreatedRegion> {
        let (entry, module) = self.resolve(type_name)?;
        let spec = self.get_spec(type_name)?;
        let implementation = (entry.deserialize)(bundle, context).map_err(|e| {
            EngineError::ImplementationConstructionFailed {
                type_name: type_name.to_string(),
                source: Box::new(e),
            }
        })?;
        debug!(target: "nupic-engine", "restored {} region '{}'", type_name, context.region_name);
        Ok(CreatedRegion {
            implementation,
            spec,
            module,
        })
    }

    /// Drop every cached spec and unload every module
    ///
    /// Fails with `OutstandingReferences` while any region still holds one.
    pub fn cleanup(&mut self) -> EngineResult<()> {
        let specs = self
            .spec_cache
            .values()
            .filter(|s| Arc::strong_count(s) > 1)
            .count();
        let modules = self
            .module_cache
            .values()
            .filter(|m| Arc::strong_count(m) > 1)
            .count();
        if specs > 0 || modules > 0 {
            return Err(EngineError::OutstandingReferences { specs, modules });
        }

        let (spec_count, module_count) = (self.spec_cache.len(), self.module_cache.len());
        self.module_types.clear();
        self.spec_cache.clear();
        self.module_cache.clear();
        info!(
            target: "nupic-engine",
            "region factory cleaned up ({} specs, {} modules)",
            spec_count,
            module_count
        );
        Ok(())
    }

    pub fn cached_spec_count(&self) -> usize {
        self.spec_cache.len()
    }

    pub fn loaded_module_count(&self) -> usize {
        self.module_cache.len()
    }
}
