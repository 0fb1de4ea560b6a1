use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{Status, Step};
use crate::{Error, Result};

/// Addresses a step either by position or by exact name. When a request
/// carries both, the index wins.
#[derive(Debug, Clone)]
pub enum StepSelector {
    Index(usize),
    Name(String),
}

/// A registered applicant and the flow they progress through. The user
/// exclusively owns its steps; `step_names` mirrors `steps` and every
/// structural mutation keeps the two in sync or leaves both untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub steps: Vec<Step>,
    pub step_names: HashSet<String>,
    pub status: Status,
    pub current_step_index: usize,
}

impl User {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            steps: Vec::new(),
            step_names: HashSet::new(),
            status: Status::InProgress,
            current_step_index: 0,
        }
    }

    pub fn current_step(&self) -> &Step {
        &self.steps[self.current_step_index]
    }

    pub fn current_step_mut(&mut self) -> &mut Step {
        &mut self.steps[self.current_step_index]
    }

    pub fn has_step(&self, step_name: &str) -> bool {
        self.step_names.contains(step_name)
    }

    /// Insert a step at `index` (`0..=len`) or append when no index is
    /// given. Name uniqueness is the caller's responsibility; the name is
    /// registered here.
    pub fn add_step(&mut self, step: Step, index: Option<usize>) -> Result<()> {
        let name = step.name.clone();
        match index {
            None => self.steps.push(step),
            Some(i) if i <= self.steps.len() => self.steps.insert(i, step),
            Some(_) => {
                return Err(Error::Validation(
                    "Index out of range. Must be between 0 and the number of existing steps."
                        .to_string(),
                ))
            }
        }
        self.step_names.insert(name);
        Ok(())
    }

    /// Remove the step the selector resolves to, releasing its name.
    /// Removing a step below the cursor pulls the cursor down with it so it
    /// keeps addressing the same step.
    pub fn remove_step(&mut self, selector: &StepSelector) -> Result<Step> {
        let index = self.resolve_step(selector)?;
        let step = self.steps.remove(index);
        self.step_names.remove(&step.name);
        if index < self.current_step_index {
            self.current_step_index -= 1;
        }
        Ok(step)
    }

    /// Swap in a fully new step at the selector's position, returning the
    /// one it displaced. Uniqueness of the new name among the *other* steps
    /// is the caller's responsibility.
    pub fn replace_step(&mut self, new_step: Step, selector: &StepSelector) -> Result<Step> {
        let index = self.resolve_step(selector)?;
        self.step_names.remove(&self.steps[index].name);
        self.step_names.insert(new_step.name.clone());
        Ok(std::mem::replace(&mut self.steps[index], new_step))
    }

    pub fn resolve_step(&self, selector: &StepSelector) -> Result<usize> {
        match selector {
            StepSelector::Index(i) if *i < self.steps.len() => Ok(*i),
            StepSelector::Index(_) => Err(Error::Validation("Index out of range".to_string())),
            StepSelector::Name(name) => self
                .steps
                .iter()
                .position(|s| s.name == *name)
                .ok_or_else(|| {
                    Error::Validation(format!("Step with name '{name}' not found"))
                }),
        }
    }
}
