use chanledger_core::engine::error::GraphError;
use std::collections::{BTreeMap, BTreeSet};

/// # Summary
/// 因子声明：名称及其依赖。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorSpec {
    pub name: String,
    pub depends_on: Vec<String>,
}

impl FactorSpec {
    pub fn new(name: &str, depends_on: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// # Summary
/// 经过校验的因子依赖图（DAG）。
///
/// # Invariants
/// - 名称非空且唯一，所有依赖均已注册，且不存在环。
/// - `order` 是稳定的拓扑序：依赖总在被依赖者之前，同层按名称升序。
#[derive(Debug, Clone)]
pub struct FactorGraph {
    order: Vec<FactorSpec>,
}

impl FactorGraph {
    /// # Summary
    /// 校验因子声明并计算拓扑序。
    ///
    /// # Logic
    /// 1. 拒绝空名称与重复名称。
    /// 2. 拒绝未注册的依赖。
    /// 3. 迭代式 DFS 检测环，报告环路径。
    /// 4. Kahn 算法排序，就绪集合使用 `BTreeSet`，同层按名称升序出队。
    ///
    /// # Arguments
    /// * `specs` - 因子声明列表，顺序无关。
    ///
    /// # Returns
    /// * `Result<Self, GraphError>` - 任何错误都是构造期致命错误。
    pub fn new(specs: Vec<FactorSpec>) -> Result<Self, GraphError> {
        let mut by_name: BTreeMap<String, FactorSpec> = BTreeMap::new();
        for spec in specs {
            if spec.name.trim().is_empty() {
                return Err(GraphError::EmptyName);
            }
            if by_name.contains_key(&spec.name) {
                return Err(GraphError::DuplicateName(spec.name));
            }
            by_name.insert(spec.name.clone(), spec);
        }

        for spec in by_name.values() {
            for dep in &spec.depends_on {
                if !by_name.contains_key(dep) {
                    return Err(GraphError::MissingDependency {
                        factor: spec.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        if let Some(cycle) = find_cycle(&by_name) {
            return Err(GraphError::Cycle(cycle));
        }

        let order = topo_sort(by_name)?;
        Ok(Self { order })
    }

    /// 拓扑序下的因子声明
    pub fn topo_order(&self) -> &[FactorSpec] {
        &self.order
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.name.as_str()).collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// 迭代式 DFS，栈帧为 (节点, 下一个待访问依赖的下标)
fn find_cycle(specs: &BTreeMap<String, FactorSpec>) -> Option<Vec<String>> {
    let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();

    for root in specs.keys() {
        if marks.contains_key(root.as_str()) {
            continue;
        }
        let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
        marks.insert(root.as_str(), Mark::Visiting);

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            let deps = specs.get(node).map(|s| s.depends_on.as_slice()).unwrap_or(&[]);
            let Some(dep) = deps.get(next) else {
                marks.insert(node, Mark::Done);
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match marks.get(dep.as_str()) {
                Some(Mark::Done) => {}
                Some(Mark::Visiting) => {
                    let from = stack.iter().position(|(n, _)| *n == dep.as_str()).unwrap_or(0);
                    let mut path: Vec<String> =
                        stack[from..].iter().map(|(n, _)| n.to_string()).collect();
                    path.push(dep.clone());
                    return Some(path);
                }
                None => {
                    marks.insert(dep.as_str(), Mark::Visiting);
                    stack.push((dep.as_str(), 0));
                }
            }
        }
    }
    None
}

fn topo_sort(mut specs: BTreeMap<String, FactorSpec>) -> Result<Vec<FactorSpec>, GraphError> {
    let mut indegree: BTreeMap<String, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for spec in specs.values() {
        indegree.insert(spec.name.clone(), spec.depends_on.len());
        for dep in &spec.depends_on {
            dependents
                .entry(dep.clone())
                .or_default()
                .push(spec.name.clone());
        }
    }

    let mut ready: BTreeSet<String> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| n.clone())
        .collect();

    let mut order = Vec::with_capacity(specs.len());
    while let Some(name) = ready.pop_first() {
        if let Some(children) = dependents.get(&name) {
            for child in children {
                if let Some(d) = indegree.get_mut(child) {
                    *d = d.saturating_sub(1);
                    if *d == 0 {
                        ready.insert(child.clone());
                    }
                }
            }
        }
        if let Some(spec) = specs.remove(&name) {
            order.push(spec);
        }
    }

    // find_cycle 已排除环，正常情况下不会有剩余节点
    if let Some(name) = specs.keys().next() {
        return Err(GraphError::Cycle(vec![name.clone()]));
    }
    Ok(order)
}
