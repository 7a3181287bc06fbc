//! # Phase Planner
//!
//! Builds the ordered phase list for a run and rejects plans that cannot be
//! executed.
//!
//! The phase graph is a `petgraph` [`DiGraph`] with an edge from each
//! prerequisite to its dependent. Ordering is Kahn's algorithm with a min-heap
//! on catalog position, so the same plan always yields the same order and
//! phases with no ordering constraint between them keep their declared order.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, info};

use crate::constants::{phases, RiskLevel, WorkflowType, BOOTSTRAP_PHASE};
use crate::error::{InvalidPlanError, Result};
use crate::orchestration::types::{ExecutionPlan, Phase, WorkflowContext};

#[derive(Debug, Clone, Default)]
pub struct PhasePlanner {
    /// Discovered phases appended after the catalog
    registered: Vec<Phase>,
}

impl PhasePlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a phase to every plan this planner creates. Replaces an earlier
    /// registration with the same id.
    pub fn register_phase(&mut self, phase: Phase) -> &mut Self {
        self.registered.retain(|existing| existing.id != phase.id);
        self.registered.push(phase);
        self
    }

    pub fn registered_phases(&self) -> &[Phase] {
        &self.registered
    }

    /// The fixed phase list for a workflow type
    pub fn catalog(workflow_type: WorkflowType) -> Vec<Phase> {
        let error_resolution = || {
            Phase::new(phases::ERROR_RESOLUTION, "Error Resolution")
                .with_prerequisites(&[BOOTSTRAP_PHASE])
                .with_estimated_duration_ms(120_000)
                .with_risk_level(RiskLevel::Medium)
        };
        let type_fixing = |after: &str| {
            Phase::new(phases::TYPE_FIXING, "Type Fixing")
                .with_prerequisites(&[after])
                .with_estimated_duration_ms(300_000)
                .with_risk_level(RiskLevel::High)
        };
        let import_rewriting = |after: &str| {
            Phase::new(phases::IMPORT_REWRITING, "Import Rewriting")
                .with_prerequisites(&[after])
                .with_estimated_duration_ms(180_000)
                .with_risk_level(RiskLevel::Medium)
        };
        let verification = |after: &str| {
            Phase::new(phases::VERIFICATION, "Verification")
                .with_prerequisites(&[after])
                .with_estimated_duration_ms(240_000)
                .with_risk_level(RiskLevel::Low)
        };

        match workflow_type {
            WorkflowType::FullMigration => vec![
                error_resolution(),
                type_fixing(phases::ERROR_RESOLUTION),
                import_rewriting(phases::TYPE_FIXING),
                verification(phases::IMPORT_REWRITING),
            ],
            WorkflowType::TypeFixOnly => vec![
                type_fixing(BOOTSTRAP_PHASE),
                verification(phases::TYPE_FIXING),
            ],
            WorkflowType::ImportRewriteOnly => vec![
                import_rewriting(BOOTSTRAP_PHASE),
                verification(phases::IMPORT_REWRITING),
            ],
            WorkflowType::VerifyOnly => vec![verification(BOOTSTRAP_PHASE)],
        }
    }

    /// Assemble the plan for this run. The plan is not validated here.
    pub fn create_execution_plan(&self, context: &WorkflowContext) -> ExecutionPlan {
        let workflow_type = context.params.workflow_type;
        let mut phase_list = Self::catalog(workflow_type);
        for phase in &self.registered {
            match phase_list.iter_mut().find(|p| p.id == phase.id) {
                Some(existing) => *existing = phase.clone(),
                None => phase_list.push(phase.clone()),
            }
        }

        let plan = ExecutionPlan::new(phase_list);
        info!(
            session_id = %context.session_id,
            plan_id = %plan.id,
            workflow_type = ?workflow_type,
            phase_count = plan.phases.len(),
            estimated_duration_ms = plan.estimated_duration_ms,
            "Execution plan created"
        );
        plan
    }

    /// Accept or reject a plan as a whole
    pub fn validate_plan(&self, plan: &ExecutionPlan) -> Result<()> {
        self.execution_order(plan).map(|_| ())
    }

    /// Phases in dependency order, ties broken by position in the plan
    pub fn execution_order(&self, plan: &ExecutionPlan) -> Result<Vec<Phase>> {
        let order = topological_positions(&plan.phases)?;
        debug!(plan_id = %plan.id, ?order, "Execution order resolved");
        Ok(order.into_iter().map(|i| plan.phases[i].clone()).collect())
    }
}

/// Positions of `phase_list` in execution order
fn topological_positions(phase_list: &[Phase]) -> std::result::Result<Vec<usize>, InvalidPlanError> {
    if phase_list.is_empty() {
        return Err(InvalidPlanError::EmptyPlan);
    }

    // Node weights are positions in `phase_list`
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(phase_list.len(), 0);
    let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(phase_list.len());
    for (position, phase) in phase_list.iter().enumerate() {
        let node = graph.add_node(position);
        if index.insert(phase.id.as_str(), node).is_some() {
            return Err(InvalidPlanError::DuplicatePhase(phase.id.clone()));
        }
    }

    for phase in phase_list {
        let dependent = index[phase.id.as_str()];
        for prerequisite in &phase.prerequisites {
            if prerequisite == BOOTSTRAP_PHASE {
                continue;
            }
            let Some(&required) = index.get(prerequisite.as_str()) else {
                return Err(InvalidPlanError::UnknownPrerequisite {
                    phase_id: phase.id.clone(),
                    prerequisite: prerequisite.clone(),
                });
            };
            graph.update_edge(required, dependent, ());
        }
    }

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|node| graph.neighbors_directed(node, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = graph
        .node_indices()
        .filter(|node| in_degree[node.index()] == 0)
        .map(|node| Reverse(graph[node]))
        .collect();

    let mut order = Vec::with_capacity(phase_list.len());
    while let Some(Reverse(position)) = ready.pop() {
        order.push(position);
        let node = NodeIndex::new(position);
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                ready.push(Reverse(graph[next]));
            }
        }
    }

    if order.len() < phase_list.len() {
        let mut members: Vec<String> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || graph.contains_edge(component[0], component[0])
            })
            .flatten()
            .map(|node| phase_list[graph[node]].id.clone())
            .collect();
        members.sort();
        return Err(InvalidPlanError::Cycle(members));
    }

    Ok(order)
}
