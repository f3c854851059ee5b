use crate::buffer::PixelBuffer;
use crate::error::QuantError;
use crate::options::OctreeOptions;
use crate::progress::Progress;
use crate::sampler;
use image::Rgb;
use std::{array, iter};

pub const MAX_LEVEL: u8 = 8;

#[derive(Debug, Default)]
struct Node {
    rgb: [u64; 3],
    count: u64,
    level: u8,
    parent: Option<u32>,
    children: [Option<u32>; 8],
}

impl Node {
    fn is_leaf(&self) -> bool {
        !self.children.iter().any(Option::is_some)
    }

    /// Holds pixels of its own, i.e. contributes a palette entry.
    fn has_color(&self) -> bool {
        self.count > 0
    }

    fn merge_color(&mut self, color: Rgb<u8>) {
        self.count += 1;
        iter::zip(&mut self.rgb, color.0).for_each(|(a, b)| *a += b as u64)
    }

    fn merge_node(&mut self, rgb: [u64; 3], count: u64) {
        self.count += count;
        iter::zip(&mut self.rgb, rgb).for_each(|(a, b)| *a += b)
    }

    fn mean(&self) -> Rgb<u8> {
        Rgb::from(array::from_fn(|i| {
            ((self.rgb[i] + self.count / 2) / self.count) as u8
        }))
    }
}

/// Nodes live in a flat arena and refer to each other by index.
#[derive(Debug, Default)]
struct Pool {
    nodes: Vec<Node>,
}

impl Pool {
    fn create(&mut self, level: u8, parent: Option<u32>) -> u32 {
        let id = self.nodes.len();
        self.nodes.push(Node {
            level,
            parent,
            ..Node::default()
        });
        id as u32
    }

    fn get(&self, id: u32) -> &Node {
        &self.nodes[id as usize]
    }

    fn get_mut(&mut self, id: u32) -> &mut Node {
        &mut self.nodes[id as usize]
    }
}

/// Child slot for `color` at `level` (1-based): one bit from each channel,
/// taken from the high end first.
fn get_color_index(color: Rgb<u8>, level: u8) -> usize {
    let shift = MAX_LEVEL - level;
    color
        .0
        .into_iter()
        .rev()
        .enumerate()
        .map(|(i, c)| (((c >> shift) & 1) << i) as usize)
        .fold(0, |s, c| s | c)
}

struct Octree {
    pool: Pool,
    root: u32,
    depth: u8,
}

impl Octree {
    fn new(depth: u8) -> Self {
        let mut pool = Pool::default();
        let root = pool.create(0, None);
        Self { pool, root, depth }
    }

    fn insert(&mut self, color: Rgb<u8>) {
        let mut node_id = self.root;
        for level in 1..=self.depth {
            let child_index = get_color_index(color, level);
            node_id = match self.pool.get(node_id).children[child_index] {
                Some(child_id) => child_id,
                None => {
                    let child_id = self.pool.create(level, Some(node_id));
                    self.pool.get_mut(node_id).children[child_index] = Some(child_id);
                    child_id
                }
            }
        }
        self.pool.get_mut(node_id).merge_color(color);
    }

    fn color_count(&self) -> usize {
        self.pool.nodes.iter().filter(|n| n.has_color()).count()
    }

    /// Folds one leaf into its parent and detaches it.
    fn fold_into_parent(&mut self, node_id: u32) {
        let node = self.pool.get_mut(node_id);
        let (rgb, count, parent) = (node.rgb, node.count, node.parent);
        node.count = 0;
        node.rgb = [0; 3];
        let Some(parent_id) = parent else {
            return;
        };
        let parent = self.pool.get_mut(parent_id);
        parent.merge_node(rgb, count);
        for slot in parent.children.iter_mut() {
            if *slot == Some(node_id) {
                *slot = None;
            }
        }
    }

    /// Merges leaves into their parents, deepest level first and least
    /// populated first within a level, until at most `target` nodes hold
    /// color. Every merge lowers the count by at most one, so the target is
    /// met exactly whenever the tree started above it.
    fn reduce_to(&mut self, target: usize, progress: &mut Progress) {
        let mut current = self.color_count();
        let start = current;
        for level in (1..=self.depth).rev() {
            if current <= target {
                break;
            }
            let mut leaves: Vec<u32> = (0..self.pool.nodes.len() as u32)
                .filter(|&id| {
                    let node = self.pool.get(id);
                    node.level == level && node.is_leaf() && node.has_color()
                })
                .collect();
            leaves.sort_by_key(|&id| (self.pool.get(id).count, id));
            for id in leaves {
                if current <= target {
                    break;
                }
                let parent_had_color = self
                    .pool
                    .get(id)
                    .parent
                    .is_some_and(|p| self.pool.get(p).has_color());
                self.fold_into_parent(id);
                if parent_had_color {
                    current -= 1;
                }
            }
            progress.step(start - current.max(target), start - target);
        }
        tracing::debug!(colors = current, target, "octree reduced");
    }

    fn palette(&self) -> Vec<Rgb<u8>> {
        self.pool
            .nodes
            .iter()
            .filter(|n| n.has_color())
            .map(Node::mean)
            .collect()
    }
}

pub fn generate(
    image: &PixelBuffer,
    color_count: usize,
    options: &OctreeOptions,
    seed: u64,
    progress: &mut Progress,
) -> Result<Vec<Rgb<u8>>, QuantError> {
    if !(1..=MAX_LEVEL).contains(&options.max_depth) {
        return Err(QuantError::InvalidConfiguration(format!(
            "octree depth must be within 1..={MAX_LEVEL}, got {}",
            options.max_depth
        )));
    }
    let offsets = sampler::sample(image, options.max_samples, seed)?;
    let mut octree = Octree::new(options.max_depth);
    for &offset in &offsets {
        octree.insert(image.rgb(offset));
    }
    octree.reduce_to(color_count.max(1), progress);
    Ok(octree.palette())
}
