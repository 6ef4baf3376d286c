//! The mapping facade: registration plus the three mapping entry points.

use std::any::Any;
use std::fmt;

use crate::config::MapperConfig;
use crate::copier::CopyPlan;
use crate::error::{BatchError, ElementError, MapError};
use crate::registry::{ConversionKey, Registry};
use crate::shape::{AnyShape, Shape, ShapeKey};

type ConversionFn = Box<dyn Fn(&dyn Any, &mut dyn Any, &Mapper) + Send + Sync>;

/// A registered conversion: the copy plan for the pair plus the user function
/// run after it.
struct Conversion {
    plan: CopyPlan,
    convert: ConversionFn,
}

/// Converts values between registered shape pairs.
///
/// Every mapping first copies the fields the two shapes have in common
/// (same name, same type, non-zero source value), then runs the conversion
/// function registered for the pair to fill in the rest.
///
/// Register everything before mapping: `register` takes `&mut self`, the
/// mapping calls take `&self`. A fully registered `Mapper` can be shared
/// across threads.
pub struct Mapper {
    config: MapperConfig,
    registry: Registry<Conversion>,
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Mapper {
    pub fn new() -> Self {
        Self::with_config(MapperConfig::default())
    }

    pub fn with_config(config: MapperConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Registers `convert` for the `S -> D` pair, replacing any earlier
    /// registration for the same pair.
    ///
    /// `convert` runs after the automatic field copy and may overwrite
    /// anything it wrote.
    pub fn register<S, D, F>(&mut self, convert: F)
    where
        S: Shape,
        D: Shape,
        F: Fn(&S, &mut D) + Send + Sync + 'static,
    {
        self.register_with(move |source: &S, destination: &mut D, _: &Mapper| {
            convert(source, destination)
        });
    }

    /// Like [`register`](Self::register), but `convert` also receives the
    /// mapper, for mapping nested shapes and collections.
    pub fn register_with<S, D, F>(&mut self, convert: F)
    where
        S: Shape,
        D: Shape,
        F: Fn(&S, &mut D, &Mapper) + Send + Sync + 'static,
    {
        let key = ConversionKey::of::<S, D>();
        let plan = CopyPlan::for_shapes::<S, D>();
        self.log_plan(&key, &plan);

        let convert: ConversionFn = Box::new(
            move |source: &dyn Any, destination: &mut dyn Any, mapper: &Mapper| {
                if let (Some(source), Some(destination)) =
                    (source.downcast_ref::<S>(), destination.downcast_mut::<D>())
                {
                    convert(source, destination, mapper);
                }
            },
        );

        if self
            .registry
            .insert(key, Conversion { plan, convert })
            .is_some()
        {
            tracing::debug!(
                mapper = %self.config.name,
                from = key.source().name(),
                to = key.destination().name(),
                "conversion replaced"
            );
        }
    }

    /// Maps `source` into a fresh `D::default()`.
    ///
    /// The pair is looked up by the runtime shape of `source`. Fails with
    /// [`MapError::NotRegistered`] when nothing is registered for it.
    pub fn map_single<D, S>(&self, source: &S) -> Result<D, MapError>
    where
        D: Shape + Default,
        S: AnyShape + ?Sized,
    {
        let conversion = self.lookup::<D, S>(source)?;
        let mut destination = D::default();
        self.run(conversion, source, &mut destination);
        Ok(destination)
    }

    /// Maps `source` onto an existing destination, in place.
    ///
    /// Fields the copy and the conversion function do not touch keep their
    /// current values.
    pub fn map_into<D, S>(&self, source: &S, destination: &mut D) -> Result<(), MapError>
    where
        D: Shape,
        S: AnyShape + ?Sized,
    {
        let conversion = self.lookup::<D, S>(source)?;
        self.run(conversion, source, destination);
        Ok(())
    }

    /// Maps every element of `sources`.
    ///
    /// Failing elements do not stop the batch. Successes are returned in
    /// input order; failures are combined into one [`BatchError`].
    pub fn map_many<'a, D, S, I>(&self, sources: I) -> Batch<D>
    where
        D: Shape + Default,
        S: AnyShape + ?Sized + 'a,
        I: IntoIterator<Item = &'a S>,
    {
        let mut mapped = Vec::new();
        let mut failures = Vec::new();
        let mut total = 0;

        for (index, source) in sources.into_iter().enumerate() {
            total += 1;
            match self.map_single::<D, S>(source) {
                Ok(destination) => mapped.push(destination),
                Err(error) => failures.push(ElementError { index, error }),
            }
        }

        let error = if failures.is_empty() {
            None
        } else {
            tracing::debug!(
                mapper = %self.config.name,
                failed = failures.len(),
                total,
                "batch finished with failures"
            );
            Some(BatchError::new(failures, total))
        };

        Batch { mapped, error }
    }

    pub fn is_registered<S: Shape, D: Shape>(&self) -> bool {
        self.registry.contains(&ConversionKey::of::<S, D>())
    }

    /// Copy plan of a registered pair.
    pub fn plan<S: Shape, D: Shape>(&self) -> Option<&CopyPlan> {
        self.registry
            .get(&ConversionKey::of::<S, D>())
            .map(|conversion| &conversion.plan)
    }

    /// Number of registered pairs.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    fn lookup<D, S>(&self, source: &S) -> Result<&Conversion, MapError>
    where
        D: Shape,
        S: AnyShape + ?Sized,
    {
        let key = ConversionKey::new(source.shape_key(), ShapeKey::of::<D>());
        self.registry.get(&key).ok_or_else(|| {
            tracing::trace!(mapper = %self.config.name, conversion = %key, "not registered");
            MapError::NotRegistered {
                from: key.source().name(),
                to: key.destination().name(),
            }
        })
    }

    fn run<S: AnyShape + ?Sized>(
        &self,
        conversion: &Conversion,
        source: &S,
        destination: &mut dyn Any,
    ) {
        let source = source.as_any();
        let copied = conversion.plan.apply(destination, source);
        (conversion.convert)(source, destination, self);
        tracing::trace!(
            mapper = %self.config.name,
            from = conversion.plan.source().name(),
            to = conversion.plan.destination().name(),
            copied,
            "mapped"
        );
    }

    fn log_plan(&self, key: &ConversionKey, plan: &CopyPlan) {
        let name = &self.config.name;
        for skipped in plan.skipped() {
            if self.config.strict {
                tracing::warn!(
                    mapper = %name,
                    conversion = %key,
                    field = skipped.name,
                    reason = %skipped.reason,
                    "field will not be copied"
                );
            } else {
                tracing::debug!(
                    mapper = %name,
                    conversion = %key,
                    field = skipped.name,
                    reason = %skipped.reason,
                    "field will not be copied"
                );
            }
        }
        tracing::debug!(
            mapper = %name,
            from = key.source().name(),
            to = key.destination().name(),
            copied = plan.copied_fields().count(),
            skipped = plan.skipped().len(),
            "conversion registered"
        );
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut conversions: Vec<String> = self.registry.keys().map(ToString::to_string).collect();
        conversions.sort_unstable();
        f.debug_struct("Mapper")
            .field("config", &self.config)
            .field("conversions", &conversions)
            .finish()
    }
}

/// Result of [`Mapper::map_many`]: the mapped elements plus, if any element
/// failed, the combined error.
#[derive(Debug)]
pub struct Batch<D> {
    pub mapped: Vec<D>,
    pub error: Option<BatchError>,
}

impl<D> Batch<D> {
    /// Whether every element was mapped.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_parts(self) -> (Vec<D>, Option<BatchError>) {
        (self.mapped, self.error)
    }

    /// All-or-nothing view: the mapped elements, or the error if any element
    /// failed.
    pub fn into_result(self) -> Result<Vec<D>, BatchError> {
        match self.error {
            None => Ok(self.mapped),
            Some(error) => Err(error),
        }
    }
}
