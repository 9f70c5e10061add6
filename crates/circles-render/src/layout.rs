//! Arena packing math — pure, device-free
//!
//! The arena's sizing invariants live here so they can be tested without an
//! adapter: each placed resource gets an offset rounded up to its alignment,
//! regions never overlap, and the total is the sum of the rounded sizes.

/// What a planned region will hold. Image regions are capacity accounting
/// (their pixels live in the arena's array texture); buffer regions are true
/// suballocations of the arena buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Buffer,
}

/// One resource's device-reported (size, alignment) requirement.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRequirement {
    pub size: u64,
    pub align: u64,
    pub kind: ResourceKind,
}

/// A planned region inside the arena.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    pub offset: u64,
    pub size: u64,
    pub kind: ResourceKind,
}

/// The packed layout for one arena: region offsets in requirement order
/// plus the total footprint.
#[derive(Debug, Clone)]
pub struct ArenaPlan {
    regions: Vec<Region>,
    total: u64,
}

/// Round `value` up to a multiple of `align` (0 or 1 means unaligned).
pub fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        return value;
    }
    value.div_ceil(align) * align
}

impl ArenaPlan {
    /// Pack the requirements in order. Placement order here is placement
    /// order at runtime and slot order in the descriptor table.
    pub fn compute(requirements: &[ResourceRequirement]) -> Self {
        let mut regions = Vec::with_capacity(requirements.len());
        let mut cursor = 0u64;
        for req in requirements {
            let offset = align_up(cursor, req.align);
            regions.push(Region {
                offset,
                size: req.size,
                kind: req.kind,
            });
            cursor = offset + req.size;
        }
        Self {
            regions,
            total: cursor,
        }
    }

    /// Total bytes the arena must reserve for this plan.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Extent of the buffer-kind regions, i.e. the size of the single
    /// device buffer backing every placed buffer.
    pub fn buffer_span(&self) -> u64 {
        self.regions
            .iter()
            .filter(|r| r.kind == ResourceKind::Buffer)
            .map(|r| r.offset + r.size)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(size: u64, align: u64, kind: ResourceKind) -> ResourceRequirement {
        ResourceRequirement { size, align, kind }
    }

    #[test]
    fn align_up_rounds() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
        assert_eq!(align_up(7, 0), 7);
        assert_eq!(align_up(7, 1), 7);
    }

    #[test]
    fn offsets_are_aligned_and_disjoint() {
        let plan = ArenaPlan::compute(&[
            req(100, 64, ResourceKind::Image),
            req(33, 256, ResourceKind::Buffer),
            req(1, 16, ResourceKind::Buffer),
        ]);
        let regions = plan.regions();
        for (r, align) in regions.iter().zip([64u64, 256, 16]) {
            assert_eq!(r.offset % align, 0);
        }
        assert_eq!(regions[0].offset, 0);
        assert_eq!(regions[1].offset, 256);
        assert_eq!(regions[2].offset, 304);
        // No overlap
        for w in regions.windows(2) {
            assert!(w[0].offset + w[0].size <= w[1].offset);
        }
        assert!(plan.total() >= regions.iter().map(|r| r.size).sum::<u64>());
    }

    #[test]
    fn total_is_monotonic_in_count_and_size() {
        let base = vec![req(128, 64, ResourceKind::Image)];
        let mut more = base.clone();
        more.push(req(64, 64, ResourceKind::Buffer));
        let mut bigger = base.clone();
        bigger[0].size = 4096;

        let t0 = ArenaPlan::compute(&base).total();
        assert!(ArenaPlan::compute(&more).total() >= t0);
        assert!(ArenaPlan::compute(&bigger).total() >= t0);
    }

    #[test]
    fn buffer_span_covers_only_buffer_regions() {
        let plan = ArenaPlan::compute(&[
            req(1000, 4, ResourceKind::Image),
            req(48, 256, ResourceKind::Buffer),
        ]);
        assert_eq!(plan.buffer_span(), 1024 + 48);

        let image_only = ArenaPlan::compute(&[req(1000, 4, ResourceKind::Image)]);
        assert_eq!(image_only.buffer_span(), 0);
    }

    #[test]
    fn empty_plan_is_empty() {
        let plan = ArenaPlan::compute(&[]);
        assert_eq!(plan.total(), 0);
        assert!(plan.regions().is_empty());
    }
}
