pub mod anchor;
pub mod pen;
pub mod pivot;
pub mod zhongshu;

use chanledger_core::engine::error::{EngineError, GraphError};
use chanledger_core::factor::entity::{
    ANCHOR_FACTOR, FactorEvent, HeadSnapshot, PEN_FACTOR, PIVOT_FACTOR, ZHONGSHU_FACTOR,
};
use std::collections::BTreeMap;

use crate::graph::FactorSpec;
use crate::tick::{FactorState, TickInput};
use anchor::AnchorProcessor;
use pen::PenProcessor;
use pivot::PivotProcessor;
use zhongshu::ZhongshuProcessor;

/// # Summary
/// 封闭的处理器集合，静态分发。
///
/// # Invariants
/// - 每个分支只以可变方式借用 `FactorState` 中属于自己的字段，依赖字段只读。
#[derive(Debug, Clone)]
pub enum FactorProcessor {
    Pivot(PivotProcessor),
    Pen(PenProcessor),
    Zhongshu(ZhongshuProcessor),
    Anchor(AnchorProcessor),
}

impl FactorProcessor {
    pub fn name(&self) -> &'static str {
        match self {
            FactorProcessor::Pivot(_) => PIVOT_FACTOR,
            FactorProcessor::Pen(_) => PEN_FACTOR,
            FactorProcessor::Zhongshu(_) => ZHONGSHU_FACTOR,
            FactorProcessor::Anchor(_) => ANCHOR_FACTOR,
        }
    }

    pub fn depends_on(&self) -> &'static [&'static str] {
        match self {
            FactorProcessor::Pivot(_) => &[],
            FactorProcessor::Pen(_) => &[PIVOT_FACTOR],
            FactorProcessor::Zhongshu(_) => &[PEN_FACTOR],
            FactorProcessor::Anchor(_) => &[PEN_FACTOR, ZHONGSHU_FACTOR],
        }
    }

    pub fn spec(&self) -> FactorSpec {
        FactorSpec::new(self.name(), self.depends_on())
    }

    /// # Summary
    /// 以拆分借用的方式把当前 K 线分发给具体处理器。
    ///
    /// # Arguments
    /// * `state` - 共享状态。
    /// * `input` - 当前 K 线。
    /// * `out` - 本次摄入的事件缓冲。
    pub fn tick(
        &self,
        state: &mut FactorState,
        input: &TickInput<'_>,
        out: &mut Vec<FactorEvent>,
    ) -> Result<(), EngineError> {
        match self {
            FactorProcessor::Pivot(p) => p.tick(&mut state.pivot, input, out),
            FactorProcessor::Pen(p) => p.tick(&mut state.pen, &state.pivot, input, out),
            FactorProcessor::Zhongshu(p) => p.tick(&mut state.zhongshu, &state.pen, input, out),
            FactorProcessor::Anchor(p) => {
                p.tick(&mut state.anchor, &state.pen, &state.zhongshu, input, out)
            }
        }
    }

    /// 头快照，分型因子没有头
    pub fn head_snapshot(&self, state: &FactorState) -> Option<HeadSnapshot> {
        match self {
            FactorProcessor::Pivot(_) => None,
            FactorProcessor::Pen(p) => Some(p.head_snapshot(&state.pivot)),
            FactorProcessor::Zhongshu(p) => Some(p.head_snapshot(&state.zhongshu)),
            FactorProcessor::Anchor(p) => Some(p.head_snapshot(&state.anchor)),
        }
    }
}

/// # Summary
/// 按名称索引的处理器注册表。
#[derive(Debug, Clone, Default)]
pub struct ProcessorRegistry {
    processors: BTreeMap<&'static str, FactorProcessor>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器，名称重复时报错
    pub fn register(&mut self, processor: FactorProcessor) -> Result<(), GraphError> {
        let name = processor.name();
        if self.processors.contains_key(name) {
            return Err(GraphError::DuplicateName(name.to_string()));
        }
        self.processors.insert(name, processor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FactorProcessor> {
        self.processors.get(name)
    }

    pub fn specs(&self) -> Vec<FactorSpec> {
        self.processors.values().map(FactorProcessor::spec).collect()
    }

    /// 按给定顺序取出处理器，名称未注册时报错
    pub fn into_ordered(mut self, names: &[&str]) -> Result<Vec<FactorProcessor>, EngineError> {
        names
            .iter()
            .map(|name| {
                self.processors.remove(*name).ok_or_else(|| {
                    EngineError::Config(format!("processor '{}' is not registered", name))
                })
            })
            .collect()
    }
}
