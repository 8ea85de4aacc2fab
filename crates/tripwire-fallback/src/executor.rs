use crate::config::{ExecutorConfig, ExecutorConfigBuilder};
use crate::error::{BoxError, ServiceUnavailable};
use crate::events::FallbackEvent;
use crate::outcome::{FallbackReason, Outcome};
use crate::provider::FallbackProvider;
use crate::ServiceMonitor;
#[cfg(feature = "metrics")]
use metrics::{counter, histogram};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tripwire_circuitbreaker::{Admission, CallPermit, CircuitBreaker, CircuitState};

/// Runs calls to a primary dependency behind a circuit breaker, a timeout
/// and a bounded worker pool, and answers from a fallback whenever the
/// primary cannot.
///
/// The executor is cheap to clone; clones share the breaker and the worker
/// pool.
///
/// ```rust
/// use std::time::Duration;
/// use tripwire_circuitbreaker::CircuitBreaker;
/// use tripwire_fallback::{CachedFallback, ProtectedExecutor};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let breaker = CircuitBreaker::builder().name("prices").build()?;
/// let executor = ProtectedExecutor::builder()
///     .call_timeout(Duration::from_millis(300))
///     .build(breaker)?;
/// let cache = CachedFallback::seeded(0u64);
///
/// let price = executor
///     .execute(|| async { Ok::<_, std::io::Error>(42u64) }, &cache)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ProtectedExecutor {
    inner: Arc<Inner>,
}

struct Inner {
    config: ExecutorConfig,
    breaker: CircuitBreaker,
    workers: Arc<Semaphore>,
    // One slot: at most one half-open probe reaches the primary at a time.
    probe: Arc<Semaphore>,
}

/// Slots held by a running primary, released when its task ends.
///
/// The task owns them, so a primary abandoned after a timeout keeps both its
/// worker slot and, when it was a half-open probe, the probe slot.
struct Slots {
    _worker: OwnedSemaphorePermit,
    _probe: Option<OwnedSemaphorePermit>,
}

/// Aborts the primary's task if the caller stops waiting for it, unless the
/// task was deliberately abandoned after a timeout.
struct AbortOnDrop<T> {
    handle: JoinHandle<T>,
    armed: bool,
}

impl<T> AbortOnDrop<T> {
    fn new(handle: JoinHandle<T>) -> Self {
        Self {
            handle,
            armed: true,
        }
    }

    fn detach(&mut self) {
        self.armed = false;
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        if self.armed {
            self.handle.abort();
        }
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl ProtectedExecutor {
    /// Creates a new builder.
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::new()
    }

    pub(crate) fn new(config: ExecutorConfig, breaker: CircuitBreaker) -> Self {
        #[cfg(feature = "metrics")]
        crate::describe_metrics();

        let workers = Arc::new(Semaphore::new(config.max_concurrent_calls));
        Self {
            inner: Arc::new(Inner {
                config,
                breaker,
                workers,
                probe: Arc::new(Semaphore::new(1)),
            }),
        }
    }

    /// Returns the breaker guarding the primary.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }

    /// Returns the executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.inner.config
    }

    /// Returns the attached monitor, if any.
    pub fn monitor(&self) -> Option<&ServiceMonitor> {
        self.inner.config.monitor.as_ref()
    }

    /// Returns the breaker state after applying the reset timeout.
    pub fn current_state(&self) -> CircuitState {
        self.inner.breaker.current_state()
    }

    /// Returns how many more primaries could start right now.
    pub fn available_workers(&self) -> usize {
        self.inner.workers.available_permits()
    }

    /// Calls `primary` under the configured timeout, or `fallback` when the
    /// primary is unavailable.
    ///
    /// Primary errors never reach the caller. The only error is
    /// [`ServiceUnavailable`], raised when the fallback fails as well.
    pub async fn execute<T, E, Op, Fut, P>(
        &self,
        primary: Op,
        fallback: &P,
    ) -> Result<T, ServiceUnavailable>
    where
        T: Send + 'static,
        E: Into<BoxError> + 'static,
        Op: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        P: FallbackProvider<T> + ?Sized,
    {
        self.execute_outcome_with_timeout(primary, fallback, self.inner.config.call_timeout)
            .await
            .map(Outcome::into_inner)
    }

    /// Like [`execute`](Self::execute) with a per-call timeout.
    ///
    /// A zero `timeout` means the configured call timeout.
    pub async fn execute_with_timeout<T, E, Op, Fut, P>(
        &self,
        primary: Op,
        fallback: &P,
        timeout: Duration,
    ) -> Result<T, ServiceUnavailable>
    where
        T: Send + 'static,
        E: Into<BoxError> + 'static,
        Op: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        P: FallbackProvider<T> + ?Sized,
    {
        self.execute_outcome_with_timeout(primary, fallback, timeout)
            .await
            .map(Outcome::into_inner)
    }

    /// Like [`execute`](Self::execute), but tells a fresh answer from a
    /// degraded one.
    pub async fn execute_outcome<T, E, Op, Fut, P>(
        &self,
        primary: Op,
        fallback: &P,
    ) -> Result<Outcome<T>, ServiceUnavailable>
    where
        T: Send + 'static,
        E: Into<BoxError> + 'static,
        Op: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        P: FallbackProvider<T> + ?Sized,
    {
        self.execute_outcome_with_timeout(primary, fallback, self.inner.config.call_timeout)
            .await
    }

    /// The general form of every `execute` variant.
    ///
    /// The primary runs on its own tokio task so that the timeout can
    /// preempt it. A primary that misses the deadline is abandoned rather
    /// than killed: it keeps running, its worker slot stays taken until it
    /// finishes, and whatever it eventually returns is dropped. Cancelling
    /// the returned future aborts the primary and records nothing. A zero
    /// `timeout` means the configured call timeout.
    pub async fn execute_outcome_with_timeout<T, E, Op, Fut, P>(
        &self,
        primary: Op,
        fallback: &P,
        timeout: Duration,
    ) -> Result<Outcome<T>, ServiceUnavailable>
    where
        T: Send + 'static,
        E: Into<BoxError> + 'static,
        Op: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        P: FallbackProvider<T> + ?Sized,
    {
        let timeout = if timeout.is_zero() {
            self.inner.config.call_timeout
        } else {
            timeout
        };

        self.run(
            move |slots| {
                tokio::spawn(async move {
                    let _slots = slots;
                    primary().await.map_err(Into::<BoxError>::into)
                })
            },
            fallback,
            timeout,
        )
        .await
    }

    /// Runs a synchronous primary on tokio's blocking pool under the
    /// configured timeout.
    ///
    /// A blocking primary cannot be aborted; after a timeout or cancellation
    /// it runs to completion in the background and its result is dropped.
    pub async fn execute_blocking<T, E, Op, P>(
        &self,
        primary: Op,
        fallback: &P,
    ) -> Result<T, ServiceUnavailable>
    where
        T: Send + 'static,
        E: Into<BoxError> + 'static,
        Op: FnOnce() -> Result<T, E> + Send + 'static,
        P: FallbackProvider<T> + ?Sized,
    {
        self.run(
            move |slots| {
                tokio::task::spawn_blocking(move || {
                    let _slots = slots;
                    primary().map_err(Into::<BoxError>::into)
                })
            },
            fallback,
            self.inner.config.call_timeout,
        )
        .await
        .map(Outcome::into_inner)
    }

    async fn run<T, S, P>(
        &self,
        spawn: S,
        fallback: &P,
        timeout: Duration,
    ) -> Result<Outcome<T>, ServiceUnavailable>
    where
        S: FnOnce(Slots) -> JoinHandle<Result<T, BoxError>>,
        P: FallbackProvider<T> + ?Sized,
    {
        let permit = match self.inner.breaker.try_acquire() {
            Admission::Permitted(permit) => permit,
            Admission::Rejected => return self.skip_primary(fallback, FallbackReason::Rejected),
        };

        // Skipping the primary says nothing about the dependency's health, so
        // in both cases below the permit is dropped unrecorded.
        let probe = if permit.admitted_in() == CircuitState::HalfOpen {
            match Arc::clone(&self.inner.probe).try_acquire_owned() {
                Ok(probe) => Some(probe),
                Err(_) => {
                    drop(permit);
                    return self.skip_primary(fallback, FallbackReason::ProbeInFlight);
                }
            }
        } else {
            None
        };

        let Ok(worker) = Arc::clone(&self.inner.workers).try_acquire_owned() else {
            drop(permit);
            return self.skip_primary(fallback, FallbackReason::Saturated);
        };

        let started = tokio::time::Instant::now();
        let mut task = AbortOnDrop::new(spawn(Slots {
            _worker: worker,
            _probe: probe,
        }));

        let joined = tokio::time::timeout(timeout, &mut task.handle).await;
        let reason = match joined {
            Ok(Ok(Ok(value))) => {
                return Ok(self.primary_succeeded(value, permit, fallback, started.elapsed()));
            }
            Ok(Ok(Err(err))) => {
                let counted = (self.inner.config.counts_as_failure)(&err);
                let recorded = counted && permit.record_failure();
                self.primary_failed(FallbackReason::Failed, recorded, &err);
                FallbackReason::Failed
            }
            Ok(Err(join_error)) if join_error.is_panic() => {
                let recorded = permit.record_failure();
                self.primary_failed(FallbackReason::Panicked, recorded, &join_error);
                FallbackReason::Panicked
            }
            Ok(Err(join_error)) => {
                drop(permit);
                self.primary_failed(FallbackReason::Cancelled, false, &join_error);
                FallbackReason::Cancelled
            }
            Err(elapsed) => {
                task.detach();
                let recorded = permit.record_failure();
                self.primary_failed(FallbackReason::TimedOut, recorded, &elapsed);
                FallbackReason::TimedOut
            }
        };

        self.use_fallback(fallback, reason)
    }

    fn primary_succeeded<T, P>(
        &self,
        value: T,
        permit: CallPermit,
        fallback: &P,
        duration: Duration,
    ) -> Outcome<T>
    where
        P: FallbackProvider<T> + ?Sized,
    {
        let config = &self.inner.config;
        permit.record_success();
        fallback.refresh(&value);

        if let Some(monitor) = &config.monitor {
            monitor.record_success(duration);
        }

        #[cfg(feature = "metrics")]
        {
            counter!("fallback_calls_total", "fallback" => config.name.clone(), "result" => "primary", "reason" => "none").increment(1);
            histogram!("fallback_primary_duration_seconds", "fallback" => config.name.clone())
                .record(duration.as_secs_f64());
        }

        config
            .event_listeners
            .emit(&FallbackEvent::PrimarySucceeded {
                pattern_name: config.name.clone(),
                timestamp: now(),
                duration,
            });

        Outcome::Primary(value)
    }

    fn primary_failed(
        &self,
        reason: FallbackReason,
        recorded: bool,
        _error: &dyn std::fmt::Display,
    ) {
        let config = &self.inner.config;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            executor = %config.name,
            reason = reason.as_str(),
            recorded,
            error = %_error,
            "primary call failed"
        );

        config.event_listeners.emit(&FallbackEvent::PrimaryFailed {
            pattern_name: config.name.clone(),
            timestamp: now(),
            reason,
            recorded,
        });
    }

    fn skip_primary<T, P>(
        &self,
        fallback: &P,
        reason: FallbackReason,
    ) -> Result<Outcome<T>, ServiceUnavailable>
    where
        P: FallbackProvider<T> + ?Sized,
    {
        let config = &self.inner.config;

        #[cfg(feature = "tracing")]
        tracing::debug!(executor = %config.name, reason = reason.as_str(), "primary skipped");

        config.event_listeners.emit(&FallbackEvent::Rejected {
            pattern_name: config.name.clone(),
            timestamp: now(),
            reason,
        });

        self.use_fallback(fallback, reason)
    }

    fn use_fallback<T, P>(
        &self,
        fallback: &P,
        reason: FallbackReason,
    ) -> Result<Outcome<T>, ServiceUnavailable>
    where
        P: FallbackProvider<T> + ?Sized,
    {
        let config = &self.inner.config;

        match fallback.fallback() {
            Ok(value) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(executor = %config.name, reason = reason.as_str(), "serving fallback");

                #[cfg(feature = "metrics")]
                counter!("fallback_calls_total", "fallback" => config.name.clone(), "result" => "fallback", "reason" => reason.as_str()).increment(1);

                if let Some(monitor) = &config.monitor {
                    monitor.record_fallback();
                }

                config
                    .event_listeners
                    .emit(&FallbackEvent::FallbackApplied {
                        pattern_name: config.name.clone(),
                        timestamp: now(),
                        reason,
                    });

                Ok(Outcome::Fallback { value, reason })
            }
            Err(source) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    executor = %config.name,
                    reason = reason.as_str(),
                    error = %source,
                    "fallback failed, service unavailable"
                );

                #[cfg(feature = "metrics")]
                counter!("fallback_calls_total", "fallback" => config.name.clone(), "result" => "unavailable", "reason" => reason.as_str()).increment(1);

                if let Some(monitor) = &config.monitor {
                    monitor.record_error();
                }

                config
                    .event_listeners
                    .emit(&FallbackEvent::FallbackFailed {
                        pattern_name: config.name.clone(),
                        timestamp: now(),
                        reason,
                    });

                Err(ServiceUnavailable::new(config.name.clone(), reason, source))
            }
        }
    }
}

impl std::fmt::Debug for ProtectedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectedExecutor")
            .field("config", &self.inner.config)
            .field("breaker", &self.inner.breaker)
            .finish()
    }
}
