#[derive(Debug)]
pub struct MatchResult<'a> {
    pub place_id: &'a str,
    pub distance: f64,
}
