// Selection-driven enrichment: the proxy client that fetches generated text
// and the coordinator that fences responses by selection generation.

pub mod client;
pub mod coordinator;
