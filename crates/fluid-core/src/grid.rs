use glam::Vec3;

const PRIME_X: i32 = 92837111;
const PRIME_Y: i32 = 689287499;
const PRIME_Z: i32 = 283923481;

/// Uniform spatial hash grid for neighbor queries.
///
/// Uses counting sort for O(N) construction: count particles per cell -> prefix sum -> scatter.
/// The table has `2 * capacity` buckets. Hash collisions are not resolved:
/// distinct cells may share a bucket and callers filter by exact distance.
///
/// The grid describes the positions it was built from and nothing else;
/// rebuild it whenever positions move.
pub struct SpatialHashGrid {
    spacing: f32,
    inv_spacing: f32,
    table_size: usize,
    capacity: usize,
    /// Count array (reused): cell_count[hash] = number of particles in cell
    cell_count: Vec<u32>,
    /// Prefix sum: cell_start[hash] = index where particles for this cell begin in sorted_indices
    cell_start: Vec<u32>,
    /// Particle indices sorted by cell hash
    sorted_indices: Vec<u32>,
    /// Cell hash per particle (used during build)
    particle_hashes: Vec<u32>,
    /// Reusable output of `query`
    query_ids: Vec<u32>,
    query_size: usize,
}

impl SpatialHashGrid {
    /// Create grid with given cell spacing and max particle capacity.
    pub fn new(spacing: f32, capacity: usize) -> Self {
        let table_size = (2 * capacity).max(1);
        Self {
            spacing,
            inv_spacing: 1.0 / spacing,
            table_size,
            capacity,
            cell_count: vec![0u32; table_size],
            cell_start: vec![0u32; table_size],
            sorted_indices: vec![0u32; capacity],
            particle_hashes: vec![0u32; capacity],
            query_ids: vec![0u32; capacity],
            query_size: 0,
        }
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    /// Change the cell spacing. The grid must be rebuilt afterwards.
    pub fn set_spacing(&mut self, spacing: f32) {
        self.spacing = spacing;
        self.inv_spacing = 1.0 / spacing;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn table_size(&self) -> usize {
        self.table_size
    }

    /// Build the grid from current positions.
    /// O(N) using counting sort.
    ///
    /// Particles past `capacity` are left out of the grid.
    pub fn build(&mut self, positions: &[Vec3], count: usize) {
        if count > self.capacity {
            tracing::warn!(
                count,
                capacity = self.capacity,
                "hash grid capacity exceeded, ignoring overflow particles"
            );
        }
        let count = count.min(self.capacity).min(positions.len());

        // 1. Clear cell_count
        self.cell_count.fill(0);

        // 2. For each particle, compute cell hash, store it, and increment count
        for i in 0..count {
            let (cx, cy, cz) = self.cell_coords(positions[i]);
            let h = self.hash_cell(cx, cy, cz);
            self.particle_hashes[i] = h as u32;
            self.cell_count[h] += 1;
        }

        // 3. Prefix sum on cell_count -> cell_start
        self.cell_start[0] = 0;
        for k in 1..self.table_size {
            self.cell_start[k] = self.cell_start[k - 1] + self.cell_count[k - 1];
        }

        // 4. Reset cell_count to 0 (reuse for scatter offsets)
        self.cell_count.fill(0);

        // 5. Scatter particles into sorted_indices
        for i in 0..count {
            let h = self.particle_hashes[i] as usize;
            let idx = self.cell_start[h] + self.cell_count[h];
            self.sorted_indices[idx as usize] = i as u32;
            self.cell_count[h] += 1;
        }

        self.query_size = 0;
    }

    /// Collect every particle in the cells overlapping a cube of half-size
    /// `max_distance` around `positions[index]`.
    ///
    /// With `max_distance == spacing` this is the 3x3x3 block around the
    /// particle's cell. Results land in `query_ids()`; the return value is
    /// their count. The particle itself is included.
    pub fn query(&mut self, positions: &[Vec3], index: usize, max_distance: f32) -> usize {
        let mut ids = std::mem::take(&mut self.query_ids);
        let mut n = 0;
        self.for_each_neighbor(positions[index], max_distance, |id| {
            if n < ids.len() {
                ids[n] = id;
                n += 1;
            }
        });
        self.query_ids = ids;
        self.query_size = n;
        n
    }

    /// Result of the last `query`.
    pub fn query_ids(&self) -> &[u32] {
        &self.query_ids[..self.query_size]
    }

    /// Read-only neighbor scan around `pos`, calling `callback` for every
    /// particle in the overlapping cells. The caller does the distance check.
    ///
    /// Cells that hash to the same bucket are visited once, so no particle is
    /// reported twice.
    pub fn for_each_neighbor<F: FnMut(u32)>(&self, pos: Vec3, max_distance: f32, mut callback: F) {
        let (lo, hi) = cell_range(pos, max_distance, self.inv_spacing);
        let mut seen = [usize::MAX; 27];
        let mut seen_len = 0;
        let mut seen_overflow: Vec<usize> = Vec::new();
        for cx in lo.0..=hi.0 {
            for cy in lo.1..=hi.1 {
                for cz in lo.2..=hi.2 {
                    let h = hash(cx, cy, cz, self.table_size);
                    if seen[..seen_len].contains(&h) || seen_overflow.contains(&h) {
                        continue;
                    }
                    if seen_len < seen.len() {
                        seen[seen_len] = h;
                        seen_len += 1;
                    } else {
                        seen_overflow.push(h);
                    }
                    for &id in self.bucket(h) {
                        callback(id);
                    }
                }
            }
        }
    }

    /// Particle indices stored in one bucket, in insertion order.
    pub fn bucket(&self, table_index: usize) -> &[u32] {
        let start = self.cell_start[table_index] as usize;
        let end = start + self.cell_count[table_index] as usize;
        &self.sorted_indices[start..end]
    }

    /// Hash function: cell coords -> table index
    #[inline]
    fn hash_cell(&self, cx: i32, cy: i32, cz: i32) -> usize {
        hash(cx, cy, cz, self.table_size)
    }

    /// Convert world position to cell coordinates
    #[inline]
    fn cell_coords(&self, pos: Vec3) -> (i32, i32, i32) {
        (
            cell_coord(pos.x, self.inv_spacing),
            cell_coord(pos.y, self.inv_spacing),
            cell_coord(pos.z, self.inv_spacing),
        )
    }
}

#[inline]
fn hash(cx: i32, cy: i32, cz: i32, table_size: usize) -> usize {
    let h = cx.wrapping_mul(PRIME_X) ^ cy.wrapping_mul(PRIME_Y) ^ cz.wrapping_mul(PRIME_Z);
    h.unsigned_abs() as usize % table_size
}

#[inline]
fn cell_coord(v: f32, inv_spacing: f32) -> i32 {
    (v * inv_spacing).floor() as i32
}

type Cell = (i32, i32, i32);

#[inline]
fn cell_range(pos: Vec3, max_distance: f32, inv_spacing: f32) -> (Cell, Cell) {
    let lo = pos - Vec3::splat(max_distance);
    let hi = pos + Vec3::splat(max_distance);
    (
        (
            cell_coord(lo.x, inv_spacing),
            cell_coord(lo.y, inv_spacing),
            cell_coord(lo.z, inv_spacing),
        ),
        (
            cell_coord(hi.x, inv_spacing),
            cell_coord(hi.y, inv_spacing),
            cell_coord(hi.z, inv_spacing),
        ),
    )
}
