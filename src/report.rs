//! 分析报告：汇总一次分析调用的全部结论，供 JSON 输出或终端打印。
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use itertools::Itertools;
use serde::Serialize;

use crate::analysis::boundness::{BoundnessResult, PlaceBound, analyze_boundedness, check_boundness};
use crate::analysis::conservation::{Conservation, analyze_conservation, analyze_conservation_in};
use crate::analysis::liveness::{LivenessLevel, analyze_liveness, is_live};
use crate::analysis::reachability::{
    ExplorationError, ExplorationMode, GraphExport, StateGraph, StateGraphConfig, StateGraphStats,
};
use crate::analysis::reversibility::analyze_reversibility;
use crate::net::{FireError, Net};
use crate::options::AnalysisKind;

#[derive(Debug, Clone, Serialize)]
pub struct DeadlockState {
    pub state_id: usize,
    pub marking: Vec<(String, String)>, // (place_name, tokens)
    /// Transition names fired from the initial marking.
    pub trace: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionLiveness {
    pub name: String,
    pub level: LivenessLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub places: usize,
    pub transitions: usize,
    pub mode: ExplorationMode,
    pub analysis_time: Duration,
    pub state_space: StateGraphStats,
    pub deadlocks: Vec<DeadlockState>,
    pub liveness: Option<BTreeMap<String, TransitionLiveness>>, // keyed by transition id
    pub live: Option<bool>,
    pub boundedness: Option<BoundnessResult>,
    pub place_bounds: Option<BTreeMap<String, PlaceBound>>,
    /// Over every transition of the net.
    pub conservation: Option<Conservation>,
    /// Over the transitions that fire somewhere in the explored graph.
    pub conservation_explored: Option<Conservation>,
    pub reversible: Option<bool>,
    pub incidence: Option<Vec<Vec<i64>>>,
    pub graph: Option<GraphExport>,
    /// Set when exploration was cut short; verdicts then cover only the
    /// explored part of the state space.
    pub error: Option<String>,
}

impl AnalysisReport {
    /// Explores the state space of `net` and runs the analyses selected by
    /// `kind`. A budget overrun is not fatal: the partial graph is analysed
    /// and the report carries the reason in `error`.
    pub fn build(
        net: &Net,
        config: &StateGraphConfig,
        kind: AnalysisKind,
    ) -> Result<(Self, StateGraph), FireError> {
        let started = Instant::now();
        let (graph, error) = match StateGraph::explore(net, net.initial_marking(), config) {
            Ok(graph) => (graph, None),
            Err(err) => {
                let reason = err.to_string();
                match err {
                    ExplorationError::BudgetExceeded { partial, .. } => (*partial, Some(reason)),
                    ExplorationError::Fire(err) => return Err(err),
                }
            }
        };

        let deadlocks = graph
            .deadlocks
            .iter()
            .map(|&node| DeadlockState {
                state_id: graph.node(node).index,
                marking: net
                    .places()
                    .iter_enumerated()
                    .map(|(place, info)| {
                        (info.name.clone(), graph.node(node).marking.tokens(place).to_string())
                    })
                    .collect(),
                trace: graph
                    .path_to(node)
                    .into_iter()
                    .map(|t| net.transitions()[t].name.clone())
                    .collect(),
            })
            .collect();

        let mut report = AnalysisReport {
            places: net.places_len(),
            transitions: net.transitions_len(),
            mode: config.mode,
            analysis_time: Duration::default(),
            state_space: graph.stats(),
            deadlocks,
            liveness: None,
            live: None,
            boundedness: None,
            place_bounds: None,
            conservation: None,
            conservation_explored: None,
            reversible: None,
            incidence: None,
            graph: None,
            error,
        };

        if kind.includes(AnalysisKind::Liveness) {
            let levels = analyze_liveness(&graph, net);
            report.live = Some(is_live(&levels));
            report.liveness = Some(
                levels
                    .into_iter()
                    .map(|(t, level)| {
                        let name = net.transitions()[t].name.clone();
                        (t.to_string(), TransitionLiveness { name, level })
                    })
                    .collect(),
            );
        }
        if kind.includes(AnalysisKind::Boundedness) {
            report.boundedness = Some(check_boundness(&graph, net));
            report.place_bounds = Some(
                analyze_boundedness(&graph, net)
                    .into_iter()
                    .map(|(p, bound)| (p.to_string(), bound))
                    .collect(),
            );
        }
        if kind.includes(AnalysisKind::Conservation) {
            report.conservation = Some(analyze_conservation(net));
            report.conservation_explored = Some(analyze_conservation_in(&graph, net));
        }
        if kind.includes(AnalysisKind::Reversibility) {
            report.reversible = Some(analyze_reversibility(&graph));
        }
        if kind.includes(AnalysisKind::Incidence) {
            let matrix = net.incidence_matrix();
            report.incidence = Some(matrix.rows().iter().map(|row| row.to_vec()).collect());
        }
        if kind.includes(AnalysisKind::Graph) {
            report.graph = Some(graph.export());
        }

        report.analysis_time = started.elapsed();
        log::debug!("analysis finished in {:?}", report.analysis_time);
        Ok((report, graph))
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Petri 网分析报告")?;
        writeln!(f, "库所: {}, 迁移: {}", self.places, self.transitions)?;
        writeln!(f, "分析时间: {:?}", self.analysis_time)?;
        writeln!(
            f,
            "状态空间 ({:?}): {} 个状态, {} 条边",
            self.mode, self.state_space.state_count, self.state_space.edge_count
        )?;

        if !self.deadlocks.is_empty() {
            writeln!(f, "\n发现 {} 个死锁状态:", self.deadlocks.len())?;
            for state in &self.deadlocks {
                let marking = state
                    .marking
                    .iter()
                    .map(|(place, tokens)| format!("{place}={tokens}"))
                    .join(", ");
                writeln!(f, "  s{}: {}", state.state_id, marking)?;
                if !state.trace.is_empty() {
                    writeln!(f, "    路径: {}", state.trace.join(" -> "))?;
                }
            }
        }

        if let Some(liveness) = &self.liveness {
            writeln!(f, "\n活性:")?;
            for (id, entry) in liveness {
                writeln!(f, "  {} '{}': {}", id, entry.name, entry.level)?;
            }
        }
        if let Some(boundedness) = &self.boundedness {
            writeln!(f, "\n有界性: {}", boundedness)?;
        }
        if let Some(conservation) = &self.conservation {
            writeln!(f, "守恒性: {}", conservation)?;
        }
        if let Some(conservation) = &self.conservation_explored {
            writeln!(f, "守恒性 (已探索迁移): {}", conservation)?;
        }
        if let Some(reversible) = self.reversible {
            writeln!(f, "可逆性: {}", reversible)?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "\n错误信息: {}", error)?;
        }
        Ok(())
    }
}
