//! Create, read, update, delete and import for any [`Family`].
//!
//! Every operation works on the host's attribute bag in place. Once the
//! server has assigned an id the bag carries it, so a caller that gets an
//! error back can still hand the id to the host.
//!
//! Reads come in two modes. A refresh that finds nothing clears the id and
//! succeeds, which the host takes as an out-of-band delete. A read right after
//! a write that finds nothing keeps the id and fails with the retryable
//! [`ProviderError::NotFoundAfterCreateOrUpdate`], and
//! [`Lifecycle::read_with_retries`] repeats it until the record shows up or
//! the operation is cancelled.

use tracing::{debug, info, instrument, warn};

use crate::attributes::AttributeBag;
use crate::client::TaikunClient;
use crate::config::RetryPolicy;
use crate::context::OperationContext;
use crate::convert::ResourceId;
use crate::error::{ProviderError, NOT_FOUND_AFTER_CREATE_OR_UPDATE};
use crate::resources::{Family, ListFilter, Record};
use crate::schema::Diagnostic;

/// What a read follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Standalone read or drift detection.
    Refresh,
    /// The read completing a create or update.
    AfterWrite,
}

/// Lifecycle operations of one family against one client.
pub struct Lifecycle<'a> {
    family: &'a dyn Family,
    client: &'a TaikunClient,
    retry: RetryPolicy,
}

impl<'a> Lifecycle<'a> {
    /// Drive `family` through `client`.
    pub fn new(family: &'a dyn Family, client: &'a TaikunClient, retry: RetryPolicy) -> Self {
        Self {
            family,
            client,
            retry,
        }
    }

    fn resource(&self) -> &'static str {
        self.family.info().resource
    }

    fn parse_id(&self, bag: &AttributeBag) -> Result<ResourceId, ProviderError> {
        let id = bag.id().ok_or_else(|| {
            ProviderError::Conversion(format!("{} has no id", self.resource()))
        })?;
        self.family.info().id_kind.parse(id)
    }

    /// Create the object, lock it if asked to, then read it back.
    #[instrument(skip_all, fields(resource_type = self.resource()))]
    pub async fn create(
        &self,
        ctx: &OperationContext,
        bag: &mut AttributeBag,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        debug!(attributes = %bag.redacted(&self.family.schema()), "Creating");
        let id = self.family.create(ctx, self.client, bag).await?;
        bag.set_id(id.as_str());
        info!(id = %id, "Created");

        if bag.get_bool(self.family.info().lock_attribute) {
            let id = self.parse_id(bag)?;
            self.family.set_lock(ctx, self.client, &id, true).await?;
            debug!(id = %id, "Locked");
        }

        self.read_with_retries(ctx, bag).await
    }

    /// Read the object into the bag.
    #[instrument(
        skip_all,
        fields(resource_type = self.resource(), id = bag.id().unwrap_or_default(), mode = ?mode)
    )]
    pub async fn read(
        &self,
        ctx: &OperationContext,
        bag: &mut AttributeBag,
        mode: ReadMode,
    ) -> Result<(), ProviderError> {
        let id = self.parse_id(bag)?;
        let page = self
            .family
            .list(ctx, self.client, &ListFilter::by_id(id), None)
            .await?;
        settle_lookup(bag, &id.to_string(), page.records, mode)
    }

    /// Read after a write, retrying while the server has not caught up.
    ///
    /// Each retry adds one warning diagnostic. Retries stop only when the
    /// record appears, a different error occurs, or the context ends.
    pub async fn read_with_retries(
        &self,
        ctx: &OperationContext,
        bag: &mut AttributeBag,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = Vec::new();
        let mut attempt = 0;
        loop {
            match self.read(ctx, bag, ReadMode::AfterWrite).await {
                Ok(()) => return Ok(diagnostics),
                Err(err) if err.is_retryable() => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    let id = bag.id().unwrap_or_default().to_string();
                    warn!(
                        resource_type = self.resource(),
                        id = %id,
                        attempt,
                        ?delay,
                        "Record not visible yet"
                    );
                    diagnostics.push(
                        Diagnostic::warning(NOT_FOUND_AFTER_CREATE_OR_UPDATE).with_detail(format!(
                            "{} {} is not listed yet, retry {} in {:?}",
                            self.resource(),
                            id,
                            attempt,
                            delay
                        )),
                    );
                    ctx.sleep(delay, "post-write read").await?;
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Apply the planned state.
    ///
    /// A locked object is unlocked first and locked again last; the update
    /// call itself only happens when a mutable attribute changed.
    #[instrument(
        skip_all,
        fields(resource_type = self.resource(), id = bag.id().unwrap_or_default())
    )]
    pub async fn update(
        &self,
        ctx: &OperationContext,
        bag: &mut AttributeBag,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let info = self.family.info();
        let id = self.parse_id(bag)?;
        debug!(attributes = %bag.redacted(&self.family.schema()), "Updating");

        if bag.prior_bool(info.lock_attribute) {
            self.family.set_lock(ctx, self.client, &id, false).await?;
            debug!("Unlocked");
        }
        if bag.has_changes(info.mutable) {
            self.family.update(ctx, self.client, &id, bag).await?;
            info!("Updated");
        }
        if bag.get_bool(info.lock_attribute) {
            self.family.set_lock(ctx, self.client, &id, true).await?;
            debug!("Locked");
        }

        self.read_with_retries(ctx, bag).await
    }

    /// Delete the object and clear the id.
    #[instrument(
        skip_all,
        fields(resource_type = self.resource(), id = bag.id().unwrap_or_default())
    )]
    pub async fn delete(
        &self,
        ctx: &OperationContext,
        bag: &mut AttributeBag,
    ) -> Result<(), ProviderError> {
        let id = self.parse_id(bag)?;
        self.family.delete(ctx, self.client, &id).await?;
        bag.clear_id();
        info!("Deleted");
        Ok(())
    }

    /// Bring an existing object under management.
    #[instrument(skip(self, ctx), fields(resource_type = self.resource()))]
    pub async fn import(
        &self,
        ctx: &OperationContext,
        id: &str,
    ) -> Result<AttributeBag, ProviderError> {
        let id = self.family.info().id_kind.parse(id)?;
        let mut bag = AttributeBag::new();
        bag.set_id(id.to_string());
        self.read(ctx, &mut bag, ReadMode::Refresh).await?;
        if bag.id().is_none() {
            return Err(ProviderError::NotFound(format!("{} {}", self.resource(), id)));
        }
        info!("Imported");
        Ok(bag)
    }
}

/// Apply the result of a by-id lookup to the bag.
///
/// One record is merged in. None clears the id on refresh and keeps it on a
/// post-write read, which fails retryably instead. More than one is an
/// invariant violation.
pub fn settle_lookup(
    bag: &mut AttributeBag,
    id: &str,
    mut records: Vec<Record>,
    mode: ReadMode,
) -> Result<(), ProviderError> {
    match (records.len(), mode) {
        (1, _) => {
            let record = records.remove(0);
            bag.merge(record);
            bag.set_id(id);
            Ok(())
        },
        (0, ReadMode::AfterWrite) => {
            bag.set_id(id);
            Err(ProviderError::NotFoundAfterCreateOrUpdate { id: id.to_string() })
        },
        (0, ReadMode::Refresh) => {
            debug!(id, "Record is gone");
            bag.clear_id();
            Ok(())
        },
        (n, _) => Err(ProviderError::Invariant(format!(
            "list by id {} returned {} records",
            id, n
        ))),
    }
}
