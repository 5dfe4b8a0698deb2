use std::sync::Arc;
use std::thread;
use std::time::Duration;

use failure::Error as FailureError;
use serde_json::Value;

use errors::*;
use models::*;

/// Calls into the payment provider. Every call carries an idempotency key so a retried
/// request cannot be executed twice by the provider.
pub trait PaymentGateway: Send + Sync {
    /// Amount of a payment intent, in currency units.
    fn price_for_payment(&self, payment_id: &PaymentId, idempotency_key: &str) -> Result<f64, FailureError>;
    fn pause_subscription(&self, subscription_id: &SubscriptionId, idempotency_key: &str) -> Result<Value, FailureError>;
    fn resume_subscription(&self, subscription_id: &SubscriptionId, idempotency_key: &str) -> Result<Value, FailureError>;
    fn cancel_subscription(&self, subscription_id: &SubscriptionId, idempotency_key: &str) -> Result<Value, FailureError>;
}

impl<G: PaymentGateway + ?Sized> PaymentGateway for Arc<G> {
    fn price_for_payment(&self, payment_id: &PaymentId, idempotency_key: &str) -> Result<f64, FailureError> {
        (**self).price_for_payment(payment_id, idempotency_key)
    }

    fn pause_subscription(&self, subscription_id: &SubscriptionId, idempotency_key: &str) -> Result<Value, FailureError> {
        (**self).pause_subscription(subscription_id, idempotency_key)
    }

    fn resume_subscription(&self, subscription_id: &SubscriptionId, idempotency_key: &str) -> Result<Value, FailureError> {
        (**self).resume_subscription(subscription_id, idempotency_key)
    }

    fn cancel_subscription(&self, subscription_id: &SubscriptionId, idempotency_key: &str) -> Result<Value, FailureError> {
        (**self).cancel_subscription(subscription_id, idempotency_key)
    }
}

/// Stand-in used when no provider is configured: every call fails.
#[derive(Clone, Debug, Default)]
pub struct UnconfiguredGateway;

impl UnconfiguredGateway {
    fn fail<T>(&self, what: &str) -> Result<T, FailureError> {
        Err(format_err!("No payment gateway configured for {}", what)
            .context(Error::UpstreamGateway)
            .into())
    }
}

impl PaymentGateway for UnconfiguredGateway {
    fn price_for_payment(&self, payment_id: &PaymentId, _idempotency_key: &str) -> Result<f64, FailureError> {
        self.fail(&format!("price of {}", payment_id))
    }

    fn pause_subscription(&self, subscription_id: &SubscriptionId, _idempotency_key: &str) -> Result<Value, FailureError> {
        self.fail(&format!("pausing {}", subscription_id))
    }

    fn resume_subscription(&self, subscription_id: &SubscriptionId, _idempotency_key: &str) -> Result<Value, FailureError> {
        self.fail(&format!("resuming {}", subscription_id))
    }

    fn cancel_subscription(&self, subscription_id: &SubscriptionId, _idempotency_key: &str) -> Result<Value, FailureError> {
        self.fail(&format!("cancelling {}", subscription_id))
    }
}

/// Retries failed gateway calls with a linear backoff, reusing one idempotency key.
pub struct RetryingGateway<G> {
    inner: G,
    attempts: u32,
    backoff: Duration,
}

impl<G: PaymentGateway> RetryingGateway<G> {
    pub fn new(inner: G, attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            backoff,
        }
    }

    fn retry<T, F>(&self, what: &str, f: F) -> Result<T, FailureError>
    where
        F: Fn(&G) -> Result<T, FailureError>,
    {
        let mut attempt = 1;
        loop {
            match f(&self.inner) {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt >= self.attempts {
                        error!("Gateway call {} failed after {} attempts: {}", what, attempt, e);
                        return Err(e.context(Error::UpstreamGateway).into());
                    }
                    warn!("Gateway call {} failed on attempt {}: {}", what, attempt, e);
                    thread::sleep(self.backoff * attempt);
                    attempt += 1;
                }
            }
        }
    }
}

impl<G: PaymentGateway> PaymentGateway for RetryingGateway<G> {
    fn price_for_payment(&self, payment_id: &PaymentId, idempotency_key: &str) -> Result<f64, FailureError> {
        self.retry("price_for_payment", |g| g.price_for_payment(payment_id, idempotency_key))
    }

    fn pause_subscription(&self, subscription_id: &SubscriptionId, idempotency_key: &str) -> Result<Value, FailureError> {
        self.retry("pause_subscription", |g| g.pause_subscription(subscription_id, idempotency_key))
    }

    fn resume_subscription(&self, subscription_id: &SubscriptionId, idempotency_key: &str) -> Result<Value, FailureError> {
        self.retry("resume_subscription", |g| g.resume_subscription(subscription_id, idempotency_key))
    }

    fn cancel_subscription(&self, subscription_id: &SubscriptionId, idempotency_key: &str) -> Result<Value, FailureError> {
        self.retry("cancel_subscription", |g| g.cancel_subscription(subscription_id, idempotency_key))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Flaky {
        failures_left: Mutex<u32>,
        keys: Mutex<Vec<String>>,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: Mutex::new(failures),
                keys: Mutex::new(vec![]),
            }
        }
    }

    impl PaymentGateway for Flaky {
        fn price_for_payment(&self, _payment_id: &PaymentId, idempotency_key: &str) -> Result<f64, FailureError> {
            self.keys.lock().unwrap().push(idempotency_key.to_string());
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(format_err!("connection reset"));
            }
            Ok(59.99)
        }

        fn pause_subscription(&self, _: &SubscriptionId, _: &str) -> Result<Value, FailureError> {
            Ok(Value::Null)
        }

        fn resume_subscription(&self, _: &SubscriptionId, _: &str) -> Result<Value, FailureError> {
            Ok(Value::Null)
        }

        fn cancel_subscription(&self, _: &SubscriptionId, _: &str) -> Result<Value, FailureError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn retries_reuse_the_idempotency_key() {
        let gateway = RetryingGateway::new(Flaky::new(2), 3, Duration::from_millis(0));

        let price = gateway.price_for_payment(&PaymentId("pi_1".into()), "key-1").unwrap();

        assert_eq!(price, 59.99);
        assert_eq!(*gateway.inner.keys.lock().unwrap(), vec!["key-1", "key-1", "key-1"]);
    }

    #[test]
    fn exhausted_retries_are_upstream_errors() {
        let gateway = RetryingGateway::new(Flaky::new(5), 2, Duration::from_millis(0));

        let e = gateway.price_for_payment(&PaymentId("pi_1".into()), "key-1").unwrap_err();

        assert_eq!(error_kind(&e), Some(Error::UpstreamGateway));
        assert_eq!(gateway.inner.keys.lock().unwrap().len(), 2);
    }
}
