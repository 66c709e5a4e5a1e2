use rand::Rng;

/// Returns a random book cost in `[lower, upper]`, inclusive. Mirrors the
/// reference design's `get_random_in_range(5, 100)` used for both initial
/// inventory and donation batches.
pub fn random_cost_in_range(lower: u32, upper: u32) -> u32 {
    rand::thread_rng().gen_range(lower..=upper)
}
