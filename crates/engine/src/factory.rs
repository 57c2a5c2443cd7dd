use chanledger_core::engine::error::EngineError;

use crate::graph::FactorGraph;
use crate::processor::anchor::AnchorProcessor;
use crate::processor::pen::PenProcessor;
use crate::processor::pivot::PivotProcessor;
use crate::processor::zhongshu::ZhongshuProcessor;
use crate::processor::{FactorProcessor, ProcessorRegistry};
use crate::settings::FactorSettings;

/// # Summary
/// 按拓扑序排好的处理器流水线。
///
/// # Invariants
/// - `processors` 与 `graph.topo_order()` 一一对应。
#[derive(Debug, Clone)]
pub struct FactorPipeline {
    graph: FactorGraph,
    processors: Vec<FactorProcessor>,
}

impl FactorPipeline {
    /// # Summary
    /// 由注册表构建依赖图与有序处理器列表。
    ///
    /// # Logic
    /// 1. 以注册表中的声明构建 `FactorGraph`，校验失败即返回。
    /// 2. 按拓扑序从注册表取出处理器。
    pub fn from_registry(registry: ProcessorRegistry) -> Result<Self, EngineError> {
        let graph = FactorGraph::new(registry.specs())?;
        let processors = registry.into_ordered(&graph.names())?;
        Ok(Self { graph, processors })
    }

    pub fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    pub fn processors(&self) -> &[FactorProcessor] {
        &self.processors
    }
}

/// # Summary
/// 注册内置的四个处理器：分型、笔、中枢、锚点。
pub fn default_registry(settings: &FactorSettings) -> Result<ProcessorRegistry, EngineError> {
    let mut registry = ProcessorRegistry::new();
    registry.register(FactorProcessor::Pivot(PivotProcessor::new(
        settings.pivot_window_major,
        settings.pivot_window_minor,
    )))?;
    registry.register(FactorProcessor::Pen(PenProcessor))?;
    registry.register(FactorProcessor::Zhongshu(ZhongshuProcessor))?;
    registry.register(FactorProcessor::Anchor(AnchorProcessor))?;
    Ok(registry)
}

/// 默认流水线
pub fn default_pipeline(settings: &FactorSettings) -> Result<FactorPipeline, EngineError> {
    FactorPipeline::from_registry(default_registry(settings)?)
}
