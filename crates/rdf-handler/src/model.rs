//! 图数据模型：沿用 `oxrdf` 的项与四元组，补充图与图工厂两个抽象。
//!
//! # 教案式说明
//! - **意图（Why）**：中间件本身不关心图的存储形式，但需要一个最小接口把元素流折叠为图、再把图展开为流；
//!   项与四元组直接采用 `oxrdf`，编解码扩展与宿主因此共享同一套类型，无需转换；
//! - **结构（How）**：[`Graph`] 抽象插入与遍历，[`GraphFactory`] 负责每次读取新建空图；
//!   `oxrdf::Dataset` 是去重的参考实现，也是默认工厂 [`DatasetFactory`] 的产物；
//! - **契约（What）**：`graph_name = GraphName::DefaultGraph` 即默认图中的三元组。

use futures::{StreamExt, stream};
pub use oxrdf::{
    BlankNode, Dataset, GraphName, Literal, NamedNode, NamedOrBlankNode, Quad, QuadRef, Term,
    Triple,
};

use crate::stream::ElementStream;

/// 去掉图名，投影为默认图中的三元组。
pub fn into_default_graph(quad: Quad) -> Quad {
    Quad::new(quad.subject, quad.predicate, quad.object, GraphName::DefaultGraph)
}

/// 可物化的图。
///
/// 实现者需满足 `Send + Sync + 'static`，因为物化结果以 `Arc` 形式在能力集中共享。
pub trait Graph: Send + Sync + 'static {
    /// 插入元素；已存在时返回 `false`。
    fn insert(&mut self, quad: Quad) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, quad: &Quad) -> bool;

    /// 以图自身的迭代顺序返回元素快照。
    fn quads(&self) -> Vec<Quad>;

    /// 把图展开为元素流，供写出路径复用流式管线。
    fn to_stream(&self) -> ElementStream {
        stream::iter(self.quads().into_iter().map(Ok)).boxed()
    }
}

/// 每次物化读取都会通过工厂新建空图。
pub trait GraphFactory: Send + Sync + 'static {
    type Graph: Graph;

    fn create(&self) -> Self::Graph;
}

impl Graph for Dataset {
    fn insert(&mut self, quad: Quad) -> bool {
        Dataset::insert(self, &quad)
    }

    fn len(&self) -> usize {
        Dataset::len(self)
    }

    fn contains(&self, quad: &Quad) -> bool {
        Dataset::contains(self, quad)
    }

    fn quads(&self) -> Vec<Quad> {
        self.iter().map(QuadRef::into_owned).collect()
    }
}

/// `oxrdf::Dataset` 的工厂，也是配置的默认工厂。
#[derive(Clone, Copy, Debug, Default)]
pub struct DatasetFactory;

impl GraphFactory for DatasetFactory {
    type Graph = Dataset;

    fn create(&self) -> Dataset {
        Dataset::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn sample() -> Quad {
        Quad::new(
            NamedNode::new_unchecked("http://example.org/subject"),
            NamedNode::new_unchecked("http://example.org/predicate"),
            Literal::new_simple_literal("object"),
            NamedNode::new_unchecked("http://example.org/graph"),
        )
    }

    #[test]
    fn default_graph_projection_keeps_terms() {
        let quad = sample();
        let triple = into_default_graph(quad.clone());
        assert!(triple.graph_name.is_default_graph());
        assert_eq!(triple.subject, quad.subject);
        assert_eq!(triple.object, quad.object);
    }

    #[test]
    fn dataset_deduplicates() {
        let mut dataset = Dataset::new();
        assert!(Graph::insert(&mut dataset, sample()));
        assert!(!Graph::insert(&mut dataset, sample()));
        assert_eq!(Graph::len(&dataset), 1);
        assert!(Graph::contains(&dataset, &sample()));
    }

    #[tokio::test]
    async fn to_stream_replays_all_quads() {
        let mut dataset = DatasetFactory.create();
        Graph::insert(&mut dataset, sample());
        Graph::insert(&mut dataset, into_default_graph(sample()));
        let replayed: Vec<Quad> = dataset.to_stream().try_collect().await.expect("replay");
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed, dataset.quads());
    }
}
