//! Facet aggregation over a query's result set
//!
//! Requested dimensions are resolved up front. One pass over their encodings
//! decides which counting backends to open; each dimension is then answered
//! by the backend of its own encoding.

use std::time::Instant;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use super::config::{BackendKinds, DimensionConfig, EncodingKind};
use super::ordered::OrderedMap;
use super::request::{FacetRequest, FacetRequests};
use super::result::{FacetResult, FacetResultBuilder, FacetValue};
use crate::field::Capabilities;
use crate::index::{FacetCounts, FacetIndex};
use crate::query::predicate::check_path;
use crate::query::{IndexQuery, Predicate};
use crate::schema::IndexSchema;
use crate::{Error, Result};

/// dimension name -> result, in request order
pub type FacetResults = OrderedMap<FacetResult>;

struct ResolvedRequest<'r> {
    name: &'r str,
    request: &'r FacetRequest,
    /// `None`: no facet data for this dimension
    dimension: Option<DimensionConfig>,
}

/// Where per-dimension count views come from.
trait CountSource {
    fn view_for(&self, dimension: &DimensionConfig) -> Option<&dyn FacetCounts>;
}

/// Batch mode: one collected result set, one backend per needed encoding.
struct CollectorCounts<'v, I: FacetIndex> {
    index: &'v I,
    backends: Vec<(EncodingKind, Box<dyn FacetCounts + 'v>)>,
}

impl<I: FacetIndex> CountSource for CollectorCounts<'_, I> {
    fn view_for(&self, dimension: &DimensionConfig) -> Option<&dyn FacetCounts> {
        if dimension.encoding == EncodingKind::Ordinal
            && !self.index.has_ordinal_data(&dimension.dimension)
        {
            return None;
        }
        self.backends
            .iter()
            .find(|(kind, _)| *kind == dimension.encoding)
            .map(|(_, view)| view.as_ref())
    }
}

/// Drill-sideways mode: one precomputed view answers every dimension.
struct SidewaysCounts<'v, I: FacetIndex> {
    index: &'v I,
    view: &'v dyn FacetCounts,
}

impl<I: FacetIndex> CountSource for SidewaysCounts<'_, I> {
    fn view_for(&self, dimension: &DimensionConfig) -> Option<&dyn FacetCounts> {
        if dimension.encoding == EncodingKind::Ordinal
            && !self.index.has_ordinal_data(&dimension.dimension)
        {
            return None;
        }
        Some(self.view)
    }
}

pub struct FacetAggregator<'a, I: FacetIndex> {
    schema: &'a IndexSchema,
    index: &'a I,
    cancel: Option<CancellationToken>,
}

impl<'a, I: FacetIndex> FacetAggregator<'a, I> {
    pub fn new(schema: &'a IndexSchema, index: &'a I) -> Self {
        Self {
            schema,
            index,
            cancel: None,
        }
    }

    /// Checked before every sub-query and every dimension.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Run `base` and count the requested facets over its results.
    ///
    /// A drill-down base asking for sideways counts runs in drill-sideways
    /// mode; anything else is collected once and counted in batch.
    pub fn aggregate(&self, base: &Predicate, requests: &FacetRequests) -> Result<FacetResults> {
        let query = base.resolve(self.schema)?;
        match &query {
            IndexQuery::DrillDown(drill) if drill.use_sideways => {
                let resolved = self.resolve_requests(requests)?;
                let dimensions: Vec<DimensionConfig> = resolved
                    .iter()
                    .filter_map(|r| r.dimension.clone())
                    .collect();
                let view = self.index.drill_sideways(drill, &dimensions)?;
                let source = SidewaysCounts {
                    index: self.index,
                    view: view.as_ref(),
                };
                self.run("sideways", &query, &resolved, &source)
            }
            _ => {
                let hits = self.index.collect(&query)?;
                self.aggregate_hits(&hits, requests, &query)
            }
        }
    }

    /// Batch mode over a result set the caller already collected.
    pub fn aggregate_hits(
        &self,
        hits: &I::Hits,
        requests: &FacetRequests,
        base_query: &IndexQuery,
    ) -> Result<FacetResults> {
        let resolved = self.resolve_requests(requests)?;

        let mut kinds = BackendKinds::empty();
        for r in resolved.iter().filter(|r| r.request.needs_counts()) {
            if let Some(dimension) = &r.dimension {
                kinds |= dimension.encoding.backend();
            }
        }

        let mut backends = Vec::new();
        for kind in kinds.encodings() {
            if kind == EncodingKind::Ordinal && !self.index.ordinal_data_available() {
                tracing::debug!("No ordinal facet data in this reader");
                continue;
            }
            match self.index.facet_counts(kind, hits)? {
                Some(view) => {
                    tracing::debug!(encoding = kind.as_str(), "Opened facet counting backend");
                    backends.push((kind, view));
                }
                None => tracing::debug!(encoding = kind.as_str(), "Facet backend unavailable"),
            }
        }

        let source = CollectorCounts {
            index: self.index,
            backends,
        };
        self.run("batch", base_query, &resolved, &source)
    }

    /// Drill-sideways mode over a view the caller already computed.
    pub fn aggregate_sideways(
        &self,
        view: &dyn FacetCounts,
        requests: &FacetRequests,
        base_query: &IndexQuery,
    ) -> Result<FacetResults> {
        let resolved = self.resolve_requests(requests)?;
        let source = SidewaysCounts {
            index: self.index,
            view,
        };
        self.run("sideways", base_query, &resolved, &source)
    }

    fn resolve_requests<'r>(&self, requests: &'r FacetRequests) -> Result<Vec<ResolvedRequest<'r>>> {
        let resolver = self.schema.resolver();
        let mut pending = Vec::new();
        for (name, request) in requests.iter() {
            let generic = request.generic_field_name.as_deref();
            for path in &request.specific_values {
                check_path(name, path)?;
            }
            let facet_capable = if request.needs_counts() {
                match resolver.resolve_with(generic, Some(name), None, Capabilities::FACET) {
                    Ok(_) => true,
                    // a dimension with sub-queries may be named after no field at all
                    Err(e) if !request.queries.is_empty() && e.is_client_error() => {
                        tracing::debug!(dimension = %name, error = %e, "Counting sub-queries only");
                        false
                    }
                    Err(e) => return Err(e),
                }
            } else {
                // pure query facet: the name need not be a field at all
                resolver
                    .find(generic, Some(name))
                    .is_some_and(|plan| plan.supports(Capabilities::FACET))
            };
            pending.push((name, request, facet_capable));
        }

        let to_configure: Vec<(Option<&str>, &str)> = pending
            .iter()
            .filter(|(_, _, capable)| *capable)
            .map(|(name, request, _)| (request.generic_field_name.as_deref(), *name))
            .collect();
        let mut configs = self.schema.facets().ensure_all(&to_configure)?.into_iter();

        Ok(pending
            .into_iter()
            .map(|(name, request, capable)| ResolvedRequest {
                name,
                request,
                dimension: if capable { configs.next().flatten() } else { None },
            })
            .collect())
    }

    fn run(
        &self,
        mode: &'static str,
        base_query: &IndexQuery,
        resolved: &[ResolvedRequest<'_>],
        source: &dyn CountSource,
    ) -> Result<FacetResults> {
        let started = Instant::now();
        let mut results = FacetResults::new();
        for r in resolved {
            self.check_cancelled()?;
            let result = self.build_dimension(r, base_query, source)?;
            results.insert(r.name, result);
        }
        metrics::counter!("facetry_facet_aggregations_total", "mode" => mode).increment(1);
        metrics::histogram!("facetry_facet_aggregation_seconds")
            .record(started.elapsed().as_secs_f64());
        Ok(results)
    }

    fn build_dimension(
        &self,
        r: &ResolvedRequest<'_>,
        base_query: &IndexQuery,
        source: &dyn CountSource,
    ) -> Result<FacetResult> {
        let request = r.request;
        let mut builder = FacetResultBuilder::new(request.sort, request.prefix.clone());

        if request.needs_counts() {
            match &r.dimension {
                Some(dimension) => self.count_dimension(&mut builder, request, dimension, source)?,
                None => {
                    tracing::debug!(dimension = %r.name, "Dimension has no facet encoding");
                    for path in &request.specific_values {
                        builder.put(
                            path.join(self.schema.settings().path_separator.as_str()),
                            FacetValue::ZERO,
                        );
                    }
                }
            }
        }

        if !request.queries.is_empty() {
            for (name, count) in self.count_sub_queries(base_query, request)? {
                builder.put(name, FacetValue::from(count));
            }
        }
        Ok(builder.build())
    }

    fn count_dimension(
        &self,
        builder: &mut FacetResultBuilder,
        request: &FacetRequest,
        dimension: &DimensionConfig,
        source: &dyn CountSource,
    ) -> Result<()> {
        let view = source.view_for(dimension);
        if view.is_none() {
            tracing::debug!(
                dimension = %dimension.dimension,
                encoding = dimension.encoding.as_str(),
                "No facet data for dimension"
            );
        }

        if let (Some(view), Some(top)) = (view, request.effective_top()) {
            if top > 0 {
                for child in view.top_children(top, dimension)? {
                    builder.put(child.label, child.value);
                }
            }
        }

        for path in &request.specific_values {
            let value = match view {
                Some(view) => view
                    .specific_value(dimension, &dimension.index_path(path))?
                    .map(FacetValue::normalized)
                    .unwrap_or(FacetValue::ZERO),
                None => FacetValue::ZERO,
            };
            builder.put(dimension.label(path), value);
        }
        Ok(())
    }

    /// `base AND sub` hit counts, in declaration order. One failure fails all.
    fn count_sub_queries(
        &self,
        base_query: &IndexQuery,
        request: &FacetRequest,
    ) -> Result<Vec<(String, u64)>> {
        let named: Vec<(&str, &Predicate)> = request.queries.iter().collect();
        let count_one = |(name, predicate): &(&str, &Predicate)| -> Result<(String, u64)> {
            self.check_cancelled()?;
            let query = base_query.clone().and(predicate.resolve(self.schema)?);
            Ok((name.to_string(), self.index.count(&query)?))
        };

        if self.schema.settings().parallel_sub_queries && named.len() > 1 {
            named.par_iter().map(count_one).collect()
        } else {
            named.iter().map(count_one).collect()
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}
