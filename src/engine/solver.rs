// ==========================================
// 产线排产核心 - 约束模型与求解器
// ==========================================
// 模型元素:
// - 布尔变量（是否选用某候选）
// - 可选区间（时长固定，是否存在由布尔变量决定）
// - 固定区间（已占用的产线时段）
// - exactly_one: 一组布尔变量恰好一个为真
// - no_overlap: 一组区间两两不重叠
// - 目标: 最小化所有存在区间的最大结束时间（makespan）
//
// 求解: pumpkin_solver（LinearSatUnsat 最小化 makespan），限时
// - 搜索完成: Optimal / Infeasible
// - 超时: 有解 Feasible，无解 Infeasible
// ==========================================

use crate::engine::error::{EngineError, EngineResult};
use pumpkin_solver::constraints as cp;
use pumpkin_solver::optimisation::linear_sat_unsat::LinearSatUnsat;
use pumpkin_solver::optimisation::OptimisationDirection;
use pumpkin_solver::results::{OptimisationResult, ProblemSolution, SolutionReference};
use pumpkin_solver::termination::TimeBudget;
use pumpkin_solver::variables::{DomainId, TransformableVariable};
use pumpkin_solver::Solver;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// 布尔变量句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoolVar(usize);

/// 区间变量句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalVar(usize);

#[derive(Debug, Clone)]
struct IntervalDef {
    name: String,
    duration: i64,
    presence: Option<BoolVar>, // None: 固定区间，必定存在
    fixed_start: Option<i64>,
}

// ==========================================
// CpModel - 约束模型
// ==========================================
#[derive(Debug, Clone)]
pub struct CpModel {
    horizon: i64,
    bool_names: Vec<String>,
    intervals: Vec<IntervalDef>,
    exactly_one: Vec<Vec<BoolVar>>,
    no_overlap: Vec<Vec<IntervalVar>>,
    minimize_makespan: bool,
}

impl CpModel {
    /// 创建模型，区间须落在 [0, horizon] 内
    pub fn new(horizon: i64) -> Self {
        Self {
            horizon,
            bool_names: Vec::new(),
            intervals: Vec::new(),
            exactly_one: Vec::new(),
            no_overlap: Vec::new(),
            minimize_makespan: false,
        }
    }

    pub fn horizon(&self) -> i64 {
        self.horizon
    }

    pub fn new_bool_var(&mut self, name: impl Into<String>) -> BoolVar {
        self.bool_names.push(name.into());
        BoolVar(self.bool_names.len() - 1)
    }

    /// 可选区间：presence 为真时存在，起点由求解器决定
    pub fn new_optional_interval(
        &mut self,
        name: impl Into<String>,
        duration: i64,
        presence: BoolVar,
    ) -> IntervalVar {
        self.intervals.push(IntervalDef {
            name: name.into(),
            duration,
            presence: Some(presence),
            fixed_start: None,
        });
        IntervalVar(self.intervals.len() - 1)
    }

    /// 固定区间：必定存在，起点固定（可为负，表示已在执行中）
    pub fn new_fixed_interval(
        &mut self,
        name: impl Into<String>,
        start: i64,
        duration: i64,
    ) -> IntervalVar {
        self.intervals.push(IntervalDef {
            name: name.into(),
            duration,
            presence: None,
            fixed_start: Some(start),
        });
        IntervalVar(self.intervals.len() - 1)
    }

    pub fn add_exactly_one(&mut self, vars: Vec<BoolVar>) {
        self.exactly_one.push(vars);
    }

    pub fn add_no_overlap(&mut self, intervals: Vec<IntervalVar>) {
        self.no_overlap.push(intervals);
    }

    pub fn minimize_makespan(&mut self) {
        self.minimize_makespan = true;
    }

    pub fn num_bool_vars(&self) -> usize {
        self.bool_names.len()
    }

    pub fn num_intervals(&self) -> usize {
        self.intervals.len()
    }

    pub fn interval_name(&self, interval: IntervalVar) -> &str {
        &self.intervals[interval.0].name
    }
}

// ==========================================
// 求解结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
}

impl SolveStatus {
    pub fn has_solution(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

/// 一组变量赋值
#[derive(Debug, Clone, PartialEq)]
pub struct CpSolution {
    bool_values: Vec<bool>,
    starts: Vec<Option<i64>>,
    durations: Vec<i64>,
    pub makespan: i64,
}

impl CpSolution {
    pub fn value(&self, var: BoolVar) -> bool {
        self.bool_values.get(var.0).copied().unwrap_or(false)
    }

    /// 区间起点；区间不存在时为 None
    pub fn start(&self, interval: IntervalVar) -> Option<i64> {
        self.starts.get(interval.0).copied().flatten()
    }

    pub fn end(&self, interval: IntervalVar) -> Option<i64> {
        self.start(interval).map(|s| s + self.durations[interval.0])
    }
}

#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub solution: Option<CpSolution>,
    pub elapsed_ms: u64,
}

// ==========================================
// ConstraintSolver Trait
// ==========================================
// 实现者: PumpkinSolver（默认）；测试或外部求解器可替换
pub trait ConstraintSolver: Send + Sync {
    fn solve(&self, model: &CpModel, time_limit: Duration) -> EngineResult<SolveOutcome>;
}

// ==========================================
// PumpkinSolver - 基于 pumpkin_solver 的求解器
// ==========================================
// 编码:
// - 布尔变量 -> [0,1] 整数；未进入任何 exactly_one 组的固定为 0（区间视为不存在）
// - exactly_one -> Σp = 1
// - 可选区间 -> 起点变量 s
//   p=1: s ∈ [0, horizon - d]
//   p=0: s 停在时间窗之后的专属槽位，槽位两两不重叠
// - no_overlap -> 容量 1 的 cumulative；同组固定区间截到 0 后合并
// - makespan >= s + d，仅对存在的区间生效
// 求解后按原起点顺序左移，结束时间只减不增
#[derive(Debug, Clone, Copy, Default)]
pub struct PumpkinSolver;

impl PumpkinSolver {
    pub fn new() -> Self {
        Self
    }
}

impl ConstraintSolver for PumpkinSolver {
    fn solve(&self, model: &CpModel, time_limit: Duration) -> EngineResult<SolveOutcome> {
        let started = Instant::now();
        let mut solver = Solver::default();

        let encoding = match encode(model, &mut solver) {
            Ok(encoding) => encoding,
            Err(EncodeError::Invalid(e)) => return Err(e),
            Err(EncodeError::Infeasible) => {
                tracing::debug!(intervals = model.intervals.len(), "建模阶段即判定无解");
                return Ok(SolveOutcome {
                    status: SolveStatus::Infeasible,
                    solution: None,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }
        };

        let mut brancher = solver.default_brancher();
        let mut termination = TimeBudget::starting_now(time_limit);
        fn noop_callback<B>(_: &Solver, _: SolutionReference, _: &B) {}
        let result = solver.optimise(
            &mut brancher,
            &mut termination,
            LinearSatUnsat::new(OptimisationDirection::Minimise, encoding.makespan, noop_callback),
        );

        let (status, solution) = match result {
            OptimisationResult::Optimal(found) => {
                (SolveStatus::Optimal, Some(extract(model, &encoding, &found)))
            }
            OptimisationResult::Satisfiable(found) => {
                // 无目标时任一可行解即最优
                let status = if model.minimize_makespan {
                    SolveStatus::Feasible
                } else {
                    SolveStatus::Optimal
                };
                (status, Some(extract(model, &encoding, &found)))
            }
            OptimisationResult::Unsatisfiable => (SolveStatus::Infeasible, None),
            OptimisationResult::Unknown => {
                tracing::warn!(
                    time_limit_ms = time_limit.as_millis() as u64,
                    "求解超时且未找到可行解"
                );
                (SolveStatus::Infeasible, None)
            }
        };

        tracing::debug!(
            status = ?status,
            intervals = model.intervals.len(),
            makespan = solution.as_ref().map(|s| s.makespan),
            "约束求解完成"
        );

        Ok(SolveOutcome {
            status,
            solution,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

// ==========================================
// 编码
// ==========================================

enum EncodeError {
    Invalid(EngineError),
    /// 约束在根节点即矛盾
    Infeasible,
}

impl From<EngineError> for EncodeError {
    fn from(e: EngineError) -> Self {
        EncodeError::Invalid(e)
    }
}

struct Encoding {
    presence: Vec<DomainId>,
    starts: Vec<Option<DomainId>>, // 固定区间为 None
    makespan: DomainId,
}

fn to_i32(value: i64, what: &str) -> EngineResult<i32> {
    i32::try_from(value)
        .map_err(|_| EngineError::Solver(format!("{} 超出求解器整数范围: {}", what, value)))
}

/// 模型校验，返回每个布尔变量是否属于某个 exactly_one 组
fn validate(model: &CpModel) -> EngineResult<Vec<bool>> {
    for def in &model.intervals {
        if def.duration < 0 {
            return Err(EngineError::Solver(format!(
                "区间时长为负: {} = {}",
                def.name, def.duration
            )));
        }
    }
    for group in &model.no_overlap {
        for iv in group {
            if iv.0 >= model.intervals.len() {
                return Err(EngineError::Solver(format!("no_overlap 引用了未知区间: {}", iv.0)));
            }
        }
    }

    let mut presence_owner: HashMap<usize, usize> = HashMap::new();
    for (g, group) in model.exactly_one.iter().enumerate() {
        for var in group {
            if var.0 >= model.bool_names.len() {
                return Err(EngineError::Solver(format!("exactly_one 引用了未知变量: {}", var.0)));
            }
            if presence_owner.insert(var.0, g).is_some() {
                return Err(EngineError::Solver(format!(
                    "变量 {} 出现在多个 exactly_one 组中",
                    model.bool_names[var.0]
                )));
            }
        }
    }
    Ok((0..model.bool_names.len())
        .map(|v| presence_owner.contains_key(&v))
        .collect())
}

/// 合并重叠/相接的时段
fn merge_spans(mut spans: Vec<(i64, i64)>) -> Vec<(i64, i64)> {
    spans.sort_unstable();
    let mut merged: Vec<(i64, i64)> = Vec::with_capacity(spans.len());
    for (from, to) in spans {
        match merged.last_mut() {
            Some(last) if from <= last.1 => last.1 = last.1.max(to),
            _ => merged.push((from, to)),
        }
    }
    merged
}

fn encode(model: &CpModel, solver: &mut Solver) -> Result<Encoding, EncodeError> {
    let owned = validate(model)?;
    let tag = solver.new_constraint_tag();

    let presence: Vec<DomainId> = owned
        .iter()
        .map(|&in_group| solver.new_bounded_integer(0, i32::from(in_group)))
        .collect();

    // 固定区间的最晚结束即 makespan 下界
    let fixed_end = model
        .intervals
        .iter()
        .filter_map(|def| def.fixed_start.map(|start| start + def.duration))
        .max()
        .unwrap_or(0)
        .max(0);
    let park_base = model.horizon.max(fixed_end);
    let makespan = solver.new_bounded_integer(
        to_i32(fixed_end, "固定区间结束")?,
        to_i32(park_base, "时间窗")?,
    );

    // ===== 可选区间: 起点 + 停放槽位 =====
    let mut starts: Vec<Option<DomainId>> = vec![None; model.intervals.len()];
    let mut next_slot = park_base;
    for (idx, def) in model.intervals.iter().enumerate() {
        let Some(var) = def.presence else { continue };
        let p = presence[var.0];
        let slot = next_slot;
        next_slot += def.duration;

        let slot_i32 = to_i32(slot, "停放槽位")?;
        let shrink = to_i32(slot - model.horizon + def.duration, "区间上界")?;
        let big_m = to_i32(slot + def.duration, "makespan 松弛量")?;
        let duration = to_i32(def.duration, "区间时长")?;
        let start = solver.new_bounded_integer(0, slot_i32);

        // 存在: s + shrink·p <= slot，即 s <= horizon - d
        solver
            .add_constraint(cp::greater_than_or_equals(
                vec![start.scaled(-1), p.scaled(-shrink)],
                -slot_i32,
                tag,
            ))
            .post()
            .map_err(|_| EncodeError::Infeasible)?;
        // 不存在: s + slot·p >= slot，即 s = slot
        solver
            .add_constraint(cp::greater_than_or_equals(
                vec![start.scaled(1), p.scaled(slot_i32)],
                slot_i32,
                tag,
            ))
            .post()
            .map_err(|_| EncodeError::Infeasible)?;
        // makespan - s - M·p >= d - M
        solver
            .add_constraint(cp::greater_than_or_equals(
                vec![makespan.scaled(1), start.scaled(-1), p.scaled(-big_m)],
                duration - big_m,
                tag,
            ))
            .post()
            .map_err(|_| EncodeError::Infeasible)?;

        starts[idx] = Some(start);
    }

    // ===== exactly_one =====
    for group in &model.exactly_one {
        if group.is_empty() {
            return Err(EncodeError::Infeasible);
        }
        let at_least: Vec<_> = group.iter().map(|v| presence[v.0].scaled(1)).collect();
        let at_most: Vec<_> = group.iter().map(|v| presence[v.0].scaled(-1)).collect();
        solver
            .add_constraint(cp::greater_than_or_equals(at_least, 1, tag))
            .post()
            .map_err(|_| EncodeError::Infeasible)?;
        solver
            .add_constraint(cp::greater_than_or_equals(at_most, -1, tag))
            .post()
            .map_err(|_| EncodeError::Infeasible)?;
    }

    // ===== no_overlap: 单位容量 cumulative =====
    for group in &model.no_overlap {
        let mut task_starts: Vec<DomainId> = Vec::new();
        let mut durations: Vec<i32> = Vec::new();
        let mut busy: Vec<(i64, i64)> = Vec::new();
        for iv in group {
            let def = &model.intervals[iv.0];
            match (starts[iv.0], def.fixed_start) {
                (Some(start), _) if def.duration > 0 => {
                    task_starts.push(start);
                    durations.push(to_i32(def.duration, "区间时长")?);
                }
                (None, Some(fixed)) => {
                    let from = fixed.max(0);
                    let to = fixed + def.duration;
                    if to > from {
                        busy.push((from, to));
                    }
                }
                _ => {}
            }
        }
        for (from, to) in merge_spans(busy) {
            let from_i32 = to_i32(from, "固定区间起点")?;
            task_starts.push(solver.new_bounded_integer(from_i32, from_i32));
            durations.push(to_i32(to - from, "固定区间时长")?);
        }
        if task_starts.len() < 2 {
            continue;
        }

        let demands = vec![1; task_starts.len()];
        solver
            .add_constraint(cp::cumulative(task_starts, durations, demands, 1, tag))
            .post()
            .map_err(|_| EncodeError::Infeasible)?;
    }

    Ok(Encoding {
        presence,
        starts,
        makespan,
    })
}

// ==========================================
// 解码
// ==========================================

fn extract<S: ProblemSolution>(model: &CpModel, encoding: &Encoding, found: &S) -> CpSolution {
    let bool_values: Vec<bool> = encoding
        .presence
        .iter()
        .map(|&p| found.get_integer_value(p) == 1)
        .collect();
    let starts: Vec<Option<i64>> = model
        .intervals
        .iter()
        .zip(&encoding.starts)
        .map(|(def, var)| match (def.presence, var) {
            (Some(p), Some(start)) if bool_values[p.0] => Some(found.get_integer_value(*start) as i64),
            (Some(_), _) => None,
            (None, _) => def.fixed_start,
        })
        .collect();

    let mut solution = CpSolution {
        bool_values,
        starts,
        durations: model.intervals.iter().map(|d| d.duration).collect(),
        makespan: 0,
    };
    left_shift(model, &mut solution);
    solution.makespan = (0..model.intervals.len())
        .filter_map(|idx| solution.end(IntervalVar(idx)))
        .max()
        .unwrap_or(0)
        .max(0);
    solution
}

/// 按原起点顺序逐个放到最早空闲位置（避开同组固定区间与已放置区间）
///
/// 每个区间的原位置在轮到它时必然空闲，故新起点不晚于原起点
fn left_shift(model: &CpModel, solution: &mut CpSolution) {
    let mut groups_of: Vec<Vec<usize>> = vec![Vec::new(); model.intervals.len()];
    for (g, group) in model.no_overlap.iter().enumerate() {
        for iv in group {
            groups_of[iv.0].push(g);
        }
    }

    let mut occupied: Vec<Vec<(i64, i64)>> = vec![Vec::new(); model.no_overlap.len()];
    for (idx, def) in model.intervals.iter().enumerate() {
        if let Some(start) = def.fixed_start {
            for &g in &groups_of[idx] {
                occupied[g].push((start, start + def.duration));
            }
        }
    }

    let mut movable: Vec<(i64, usize)> = model
        .intervals
        .iter()
        .enumerate()
        .filter(|(_, def)| def.presence.is_some())
        .filter_map(|(idx, _)| solution.starts[idx].map(|start| (start, idx)))
        .collect();
    movable.sort_unstable();

    for (_, idx) in movable {
        let duration = solution.durations[idx];
        let mut busy: Vec<(i64, i64)> = groups_of[idx]
            .iter()
            .flat_map(|&g| occupied[g].iter().copied())
            .filter(|(from, to)| to > from)
            .collect();
        busy.sort_unstable();

        let mut start = 0;
        for (from, to) in busy {
            if start + duration <= from {
                break;
            }
            start = start.max(to);
        }
        for &g in &groups_of[idx] {
            occupied[g].push((start, start + duration));
        }
        solution.starts[idx] = Some(start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构建 n 个任务 × 若干资源的模型，durations[task][resource]（None 表示不可用）
    fn build(horizon: i64, durations: &[Vec<Option<i64>>], resources: usize) -> (CpModel, Vec<Vec<(BoolVar, IntervalVar)>>) {
        let mut model = CpModel::new(horizon);
        let mut per_resource: Vec<Vec<IntervalVar>> = vec![Vec::new(); resources];
        let mut vars = Vec::new();
        for (t, row) in durations.iter().enumerate() {
            let mut task_vars = Vec::new();
            for (r, d) in row.iter().enumerate() {
                let Some(d) = d else { continue };
                let b = model.new_bool_var(format!("t{}_r{}", t, r));
                let iv = model.new_optional_interval(format!("iv_t{}_r{}", t, r), *d, b);
                per_resource[r].push(iv);
                task_vars.push((b, iv));
            }
            model.add_exactly_one(task_vars.iter().map(|(b, _)| *b).collect());
            vars.push(task_vars);
        }
        for ivs in per_resource {
            model.add_no_overlap(ivs);
        }
        model.minimize_makespan();
        (model, vars)
    }

    /// 单资源: 一个固定占用 + 一个可选区间
    fn busy_line(horizon: i64, busy: (i64, i64), duration: i64) -> (CpModel, IntervalVar) {
        let mut model = CpModel::new(horizon);
        let fixed = model.new_fixed_interval("busy", busy.0, busy.1 - busy.0);
        let b = model.new_bool_var("b");
        let iv = model.new_optional_interval("iv", duration, b);
        model.add_exactly_one(vec![b]);
        model.add_no_overlap(vec![fixed, iv]);
        model.minimize_makespan();
        (model, iv)
    }

    fn assert_no_overlap(solution: &CpSolution, groups: &[Vec<IntervalVar>]) {
        for group in groups {
            let mut spans: Vec<(i64, i64)> = group
                .iter()
                .filter_map(|iv| Some((solution.start(*iv)?, solution.end(*iv)?)))
                .collect();
            spans.sort();
            for w in spans.windows(2) {
                assert!(w[0].1 <= w[1].0, "overlap {:?}", w);
            }
        }
    }

    #[test]
    fn test_balances_identical_tasks_over_two_resources() {
        let durations = vec![vec![Some(60), Some(60)]; 4];
        let (model, vars) = build(1_000, &durations, 2);
        let outcome = PumpkinSolver::new()
            .solve(&model, Duration::from_secs(5))
            .unwrap();

        assert_eq!(outcome.status, SolveStatus::Optimal);
        let solution = outcome.solution.unwrap();
        assert_eq!(solution.makespan, 120);
        for task in &vars {
            assert_eq!(task.iter().filter(|(b, _)| solution.value(*b)).count(), 1);
        }
        assert_no_overlap(&solution, &model.no_overlap);
    }

    #[test]
    fn test_finds_optimum_greedy_misses() {
        // LPT 贪心: 3,3,2,2,2 -> 7；最优 6 (3+3 | 2+2+2)
        let durations: Vec<Vec<Option<i64>>> = [3, 3, 2, 2, 2]
            .iter()
            .map(|d| vec![Some(*d), Some(*d)])
            .collect();
        let (model, _) = build(100, &durations, 2);
        let outcome = PumpkinSolver::new()
            .solve(&model, Duration::from_secs(5))
            .unwrap();
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.solution.unwrap().makespan, 6);
    }

    #[test]
    fn test_horizon_too_short_is_infeasible() {
        let durations = vec![vec![Some(50)], vec![Some(50)]];
        let (model, _) = build(80, &durations, 1);
        let outcome = PumpkinSolver::new()
            .solve(&model, Duration::from_secs(5))
            .unwrap();
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert!(outcome.solution.is_none());
    }

    #[test]
    fn test_fixed_interval_blocks_resource_prefix() {
        let (model, iv) = busy_line(500, (-30, 70), 40);
        let solution = PumpkinSolver::new()
            .solve(&model, Duration::from_secs(1))
            .unwrap()
            .solution
            .unwrap();
        assert_eq!(solution.start(iv), Some(70));
        assert_eq!(solution.makespan, 110);
    }

    #[test]
    fn test_interval_fills_gap_before_fixed_interval() {
        // 产线 [120, 240) 已占用，60 分钟的区间放在 [0, 60)
        let (model, iv) = busy_line(1_000, (120, 240), 60);
        let outcome = PumpkinSolver::new()
            .solve(&model, Duration::from_secs(5))
            .unwrap();

        assert_eq!(outcome.status, SolveStatus::Optimal);
        let solution = outcome.solution.unwrap();
        assert_eq!(solution.start(iv), Some(0));
        assert_eq!(solution.end(iv), Some(60));
        assert_eq!(solution.makespan, 240);
    }

    #[test]
    fn test_gap_before_fixed_interval_keeps_short_horizon_feasible() {
        // 固定占用之后只剩 60 分钟，90 分钟的区间只能放进前面的空档
        let (model, iv) = busy_line(300, (120, 240), 90);
        let outcome = PumpkinSolver::new()
            .solve(&model, Duration::from_secs(5))
            .unwrap();

        assert!(outcome.status.has_solution());
        let solution = outcome.solution.unwrap();
        assert_eq!(solution.start(iv), Some(0));
        assert_eq!(solution.end(iv), Some(90));
        assert_no_overlap(&solution, &model.no_overlap);
    }

    #[test]
    fn test_overlapping_fixed_intervals_are_merged() {
        let mut model = CpModel::new(500);
        let a = model.new_fixed_interval("a", 0, 100);
        let b = model.new_fixed_interval("b", 50, 100);
        let p = model.new_bool_var("p");
        let iv = model.new_optional_interval("iv", 30, p);
        model.add_exactly_one(vec![p]);
        model.add_no_overlap(vec![a, b, iv]);
        model.minimize_makespan();

        let solution = PumpkinSolver::new()
            .solve(&model, Duration::from_secs(5))
            .unwrap()
            .solution
            .unwrap();
        assert_eq!(solution.start(iv), Some(150));
        assert_eq!(solution.makespan, 180);
    }

    #[test]
    fn test_interval_outside_exactly_one_is_absent() {
        let mut model = CpModel::new(100);
        let chosen = model.new_bool_var("chosen");
        let stray = model.new_bool_var("stray");
        let iv = model.new_optional_interval("iv", 30, chosen);
        let stray_iv = model.new_optional_interval("stray_iv", 30, stray);
        model.add_exactly_one(vec![chosen]);
        model.add_no_overlap(vec![iv, stray_iv]);
        model.minimize_makespan();

        let solution = PumpkinSolver::new()
            .solve(&model, Duration::from_secs(5))
            .unwrap()
            .solution
            .unwrap();
        assert!(solution.value(chosen));
        assert!(!solution.value(stray));
        assert_eq!(solution.start(stray_iv), None);
        assert_eq!(solution.start(iv), Some(0));
        assert_eq!(solution.makespan, 30);
    }

    #[test]
    fn test_zero_time_limit_reports_consistent_outcome() {
        let durations = vec![vec![Some(10), Some(12), Some(15)]; 12];
        let (model, _) = build(10_000, &durations, 3);
        let outcome = PumpkinSolver::new()
            .solve(&model, Duration::ZERO)
            .unwrap();
        assert_eq!(outcome.status.has_solution(), outcome.solution.is_some());
        if let Some(solution) = &outcome.solution {
            assert_no_overlap(solution, &model.no_overlap);
        }
    }

    #[test]
    fn test_shared_presence_var_is_rejected() {
        let mut model = CpModel::new(10);
        let b = model.new_bool_var("b");
        model.add_exactly_one(vec![b]);
        model.add_exactly_one(vec![b]);
        assert!(matches!(
            PumpkinSolver::new().solve(&model, Duration::from_secs(1)),
            Err(EngineError::Solver(_))
        ));
    }

    #[test]
    fn test_empty_exactly_one_group_is_infeasible() {
        let mut model = CpModel::new(10);
        model.add_exactly_one(Vec::new());
        let outcome = PumpkinSolver::new()
            .solve(&model, Duration::from_secs(1))
            .unwrap();
        assert_eq!(outcome.status, SolveStatus::Infeasible);
    }

    #[test]
    fn test_empty_model_is_optimal() {
        let model = CpModel::new(10);
        let outcome = PumpkinSolver::new()
            .solve(&model, Duration::from_secs(1))
            .unwrap();
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.solution.unwrap().makespan, 0);
    }

    #[test]
    fn test_merge_spans_joins_touching_and_overlapping() {
        assert_eq!(
            merge_spans(vec![(50, 80), (0, 10), (10, 20), (60, 70)]),
            vec![(0, 20), (50, 80)]
        );
    }
}
