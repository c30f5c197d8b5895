//! Dependency ordering for module batches.
//!
//! Produces a load order in which every module appears after all of its
//! declared dependencies, by walking the dependency forest depth-first and
//! emitting each node post-order. Matching is by `name:version` key. A
//! dependency satisfied by an already-running module is trivially resolved;
//! a dependency that is neither installed nor running fails the whole batch,
//! and the active resolution path is tracked so a cycle fails instead of
//! recursing forever.

use std::collections::{HashMap, HashSet};

use super::descriptor::ModuleDescriptor;
use super::{ModuleError, Result};

/// One-shot resolver over a batch of module descriptors.
pub struct DependencyResolver {
    modules: Vec<ModuleDescriptor>,
    by_key: HashMap<String, usize>,
    loaded: HashSet<String>,
}

impl DependencyResolver {
    /// `already_loaded` holds the `name:version` keys of modules running
    /// before this batch started.
    pub fn new(
        modules: Vec<ModuleDescriptor>,
        already_loaded: impl IntoIterator<Item = String>,
    ) -> Self {
        let by_key = modules
            .iter()
            .enumerate()
            .map(|(index, module)| (module.key(), index))
            .collect();
        Self {
            modules,
            by_key,
            loaded: already_loaded.into_iter().collect(),
        }
    }

    /// Produce the dependencies-first load order.
    ///
    /// A module needed by several dependents is emitted exactly once, at its
    /// first resolution.
    pub fn order(self) -> Result<Vec<ModuleDescriptor>> {
        let mut resolved: HashSet<String> = HashSet::new();
        let mut path: Vec<String> = Vec::new();
        let mut order: Vec<ModuleDescriptor> = Vec::new();

        for index in 0..self.modules.len() {
            if resolved.contains(&self.modules[index].key()) {
                // already emitted as a dependency of an earlier module
                continue;
            }
            self.visit(index, &mut path, &mut resolved, &mut order)?;
        }

        Ok(order)
    }

    fn visit(
        &self,
        index: usize,
        path: &mut Vec<String>,
        resolved: &mut HashSet<String>,
        order: &mut Vec<ModuleDescriptor>,
    ) -> Result<()> {
        let module = &self.modules[index];
        let key = module.key();
        path.push(key.clone());

        for dependency in &module.dependencies {
            if let Some(start) = path.iter().position(|k| k == dependency) {
                let mut chain: Vec<String> = path[start..].to_vec();
                chain.push(dependency.clone());
                path.pop();
                return Err(ModuleError::DependencyCycle { chain });
            }
            if resolved.contains(dependency) || self.loaded.contains(dependency) {
                continue;
            }
            match self.by_key.get(dependency) {
                Some(&dependency_index) => {
                    self.visit(dependency_index, path, resolved, order)?;
                }
                None => {
                    path.pop();
                    return Err(ModuleError::DependencyNotFound {
                        module: module.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        path.pop();
        resolved.insert(key);
        order.push(module.clone());
        Ok(())
    }
}
