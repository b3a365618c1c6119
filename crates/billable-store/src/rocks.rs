//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use billable_core::{
    Charge, ChargeId, Customer, CustomerId, OwnerId, PaymentMethod, PaymentMethodId, Processor,
    Subscription, SubscriptionId,
};

use crate::error::{Result, StoreError};
use crate::keys::{self, ID_LEN};
use crate::schema::{all_column_families, cf};
use crate::{ProcessedEvent, Store};

/// RocksDB-backed storage implementation.
///
/// Reads go straight to the database. Read-modify-write operations hold
/// `write_lock` and commit through a single `WriteBatch`.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_raw(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_value<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        self.get_raw(cf_name, key)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Follow an index entry whose value is a 16-byte record id.
    fn lookup_index(&self, index_cf: &str, key: &[u8]) -> Result<Option<[u8; ID_LEN]>> {
        match self.get_raw(index_cf, key)? {
            Some(value) => keys::id_from_value(&value)
                .map(Some)
                .ok_or_else(|| StoreError::Serialization(format!("corrupt index in {index_cf}"))),
            None => Ok(None),
        }
    }

    /// Collect child ids under a customer prefix, in key (creation) order.
    fn scan_customer_children(
        &self,
        index_cf: &str,
        customer_id: &CustomerId,
    ) -> Result<Vec<[u8; ID_LEN]>> {
        let cf = self.cf(index_cf)?;
        let prefix = keys::customer_prefix(customer_id);

        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut children = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            if let Some(child) = keys::child_from_customer_key(&key) {
                children.push(child);
            }
        }
        Ok(children)
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_payment_method(&self, id: &PaymentMethodId) -> Result<Option<PaymentMethod>> {
        self.get_value(cf::PAYMENT_METHODS, &id.to_bytes())
    }

    fn get_subscription(&self, id: &SubscriptionId) -> Result<Option<Subscription>> {
        self.get_value(cf::SUBSCRIPTIONS, &id.to_bytes())
    }

    fn get_charge(&self, id: &ChargeId) -> Result<Option<Charge>> {
        self.get_value(cf::CHARGES, &id.to_bytes())
    }

    /// Add a payment method record and its indexes to a batch, dropping the
    /// index entries of `previous` that no longer apply.
    fn stage_payment_method(
        &self,
        batch: &mut WriteBatch,
        payment_method: &PaymentMethod,
        previous: Option<&PaymentMethod>,
    ) -> Result<()> {
        let cf_records = self.cf(cf::PAYMENT_METHODS)?;
        let cf_by_processor = self.cf(cf::PAYMENT_METHODS_BY_PROCESSOR_ID)?;
        let cf_by_customer = self.cf(cf::PAYMENT_METHODS_BY_CUSTOMER)?;
        let id = payment_method.id.to_bytes();

        if let Some(previous) = previous {
            if previous.processor_id != payment_method.processor_id {
                batch.delete_cf(&cf_by_processor, keys::processor_key(&previous.processor_id));
            }
            if previous.customer_id != payment_method.customer_id {
                batch.delete_cf(
                    &cf_by_customer,
                    keys::customer_child_key(&previous.customer_id, id),
                );
            }
        }

        batch.put_cf(&cf_records, id, Self::serialize(payment_method)?);
        batch.put_cf(
            &cf_by_processor,
            keys::processor_key(&payment_method.processor_id),
            id,
        );
        batch.put_cf(
            &cf_by_customer,
            keys::customer_child_key(&payment_method.customer_id, id),
            [],
        );
        Ok(())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Customer Operations
    // =========================================================================

    fn put_customer(&self, customer: &Customer) -> Result<()> {
        let _guard = self.lock()?;

        let cf_customers = self.cf(cf::CUSTOMERS)?;
        let cf_by_owner = self.cf(cf::CUSTOMERS_BY_OWNER)?;
        let cf_by_processor = self.cf(cf::CUSTOMERS_BY_PROCESSOR_ID)?;
        let id = customer.id.to_bytes();

        let mut batch = WriteBatch::default();

        // Drop a stale remote-id index if the processor id changed.
        if let Some(previous) = self.get_customer(&customer.id)? {
            if let Some(old) = previous.processor_id.filter(|old| {
                customer.processor_id.as_deref() != Some(old.as_str()) && !old.is_empty()
            }) {
                batch.delete_cf(&cf_by_processor, keys::processor_key(&old));
            }
        }

        batch.put_cf(&cf_customers, id, Self::serialize(customer)?);
        batch.put_cf(
            &cf_by_owner,
            keys::owner_key(&customer.owner_id, customer.processor),
            id,
        );
        if let Some(processor_id) = customer.processor_id.as_deref().filter(|p| !p.is_empty()) {
            batch.put_cf(&cf_by_processor, keys::processor_key(processor_id), id);
        }

        self.write(batch)
    }

    fn get_customer(&self, customer_id: &CustomerId) -> Result<Option<Customer>> {
        self.get_value(cf::CUSTOMERS, &customer_id.to_bytes())
    }

    fn find_customer_by_owner(
        &self,
        owner_id: &OwnerId,
        processor: Processor,
    ) -> Result<Option<Customer>> {
        match self.lookup_index(cf::CUSTOMERS_BY_OWNER, &keys::owner_key(owner_id, processor))? {
            Some(id) => self.get_customer(&CustomerId::from_bytes(id)),
            None => Ok(None),
        }
    }

    fn find_customer_by_processor_id(&self, processor_id: &str) -> Result<Option<Customer>> {
        match self.lookup_index(
            cf::CUSTOMERS_BY_PROCESSOR_ID,
            &keys::processor_key(processor_id),
        )? {
            Some(id) => self.get_customer(&CustomerId::from_bytes(id)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Payment Method Operations
    // =========================================================================

    fn find_or_create_payment_method(
        &self,
        customer_id: &CustomerId,
        processor_id: &str,
    ) -> Result<PaymentMethod> {
        let _guard = self.lock()?;

        let existing = self.find_payment_method_by_processor_id(processor_id)?;
        if let Some(existing) = &existing {
            if existing.customer_id == *customer_id {
                return Ok(existing.clone());
            }
        }

        let payment_method = match &existing {
            Some(previous) => {
                tracing::debug!(
                    processor_id = %processor_id,
                    from = %previous.customer_id,
                    to = %customer_id,
                    "Moving payment method to another customer"
                );
                PaymentMethod {
                    customer_id: *customer_id,
                    default: false,
                    updated_at: Utc::now(),
                    ..previous.clone()
                }
            }
            None => PaymentMethod::new(*customer_id, processor_id),
        };

        let mut batch = WriteBatch::default();
        self.stage_payment_method(&mut batch, &payment_method, existing.as_ref())?;
        self.write(batch)?;

        Ok(payment_method)
    }

    fn put_payment_method(&self, payment_method: &PaymentMethod) -> Result<()> {
        let _guard = self.lock()?;

        let previous = self.get_payment_method(&payment_method.id)?;
        let mut batch = WriteBatch::default();
        self.stage_payment_method(&mut batch, payment_method, previous.as_ref())?;
        self.write(batch)
    }

    fn find_payment_method_by_processor_id(
        &self,
        processor_id: &str,
    ) -> Result<Option<PaymentMethod>> {
        match self.lookup_index(
            cf::PAYMENT_METHODS_BY_PROCESSOR_ID,
            &keys::processor_key(processor_id),
        )? {
            Some(id) => self.get_payment_method(&PaymentMethodId::from_bytes(id)),
            None => Ok(None),
        }
    }

    fn mark_default_payment_method(
        &self,
        customer_id: &CustomerId,
        processor_id: &str,
    ) -> Result<PaymentMethod> {
        let _guard = self.lock()?;

        let methods = self.list_payment_methods(customer_id)?;
        if !methods.iter().any(|pm| pm.processor_id == processor_id) {
            return Err(StoreError::not_found("payment method", processor_id));
        }

        let now = Utc::now();
        let mut batch = WriteBatch::default();
        let mut target = None;

        for mut pm in methods {
            let is_target = pm.processor_id == processor_id;
            if pm.default != is_target {
                pm.default = is_target;
                pm.updated_at = now;
                let previous = pm.clone();
                self.stage_payment_method(&mut batch, &pm, Some(&previous))?;
            }
            if is_target {
                target = Some(pm);
            }
        }

        self.write(batch)?;
        target.ok_or_else(|| StoreError::not_found("payment method", processor_id))
    }

    fn clear_default_payment_method(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<PaymentMethod>> {
        let _guard = self.lock()?;

        let now = Utc::now();
        let mut batch = WriteBatch::default();
        let mut cleared = None;

        for mut pm in self.list_payment_methods(customer_id)? {
            if pm.default {
                pm.default = false;
                pm.updated_at = now;
                let previous = pm.clone();
                self.stage_payment_method(&mut batch, &pm, Some(&previous))?;
                cleared = Some(pm);
            }
        }

        self.write(batch)?;
        Ok(cleared)
    }

    fn default_payment_method(&self, customer_id: &CustomerId) -> Result<Option<PaymentMethod>> {
        Ok(self
            .list_payment_methods(customer_id)?
            .into_iter()
            .find(|pm| pm.default))
    }

    fn list_payment_methods(&self, customer_id: &CustomerId) -> Result<Vec<PaymentMethod>> {
        let mut methods = Vec::new();
        for id in self.scan_customer_children(cf::PAYMENT_METHODS_BY_CUSTOMER, customer_id)? {
            if let Some(pm) = self.get_payment_method(&PaymentMethodId::from_bytes(id))? {
                methods.push(pm);
            }
        }
        Ok(methods)
    }

    fn delete_payment_method(&self, processor_id: &str) -> Result<bool> {
        let _guard = self.lock()?;

        let Some(pm) = self.find_payment_method_by_processor_id(processor_id)? else {
            return Ok(false);
        };

        let cf_records = self.cf(cf::PAYMENT_METHODS)?;
        let cf_by_processor = self.cf(cf::PAYMENT_METHODS_BY_PROCESSOR_ID)?;
        let cf_by_customer = self.cf(cf::PAYMENT_METHODS_BY_CUSTOMER)?;
        let id = pm.id.to_bytes();

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_records, id);
        batch.delete_cf(&cf_by_processor, keys::processor_key(processor_id));
        batch.delete_cf(&cf_by_customer, keys::customer_child_key(&pm.customer_id, id));
        self.write(batch)?;

        Ok(true)
    }

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    fn upsert_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        let _guard = self.lock()?;

        let cf_records = self.cf(cf::SUBSCRIPTIONS)?;
        let cf_by_processor = self.cf(cf::SUBSCRIPTIONS_BY_PROCESSOR_ID)?;
        let cf_by_customer = self.cf(cf::SUBSCRIPTIONS_BY_CUSTOMER)?;

        let mut record = subscription.clone();
        record.updated_at = Utc::now();

        let mut batch = WriteBatch::default();
        if let Some(existing) = self.find_subscription_by_processor_id(&subscription.processor_id)?
        {
            record.id = existing.id;
            record.created_at = existing.created_at;
            if existing.customer_id != record.customer_id {
                batch.delete_cf(
                    &cf_by_customer,
                    keys::customer_child_key(&existing.customer_id, existing.id.to_bytes()),
                );
            }
        }

        let id = record.id.to_bytes();
        batch.put_cf(&cf_records, id, Self::serialize(&record)?);
        batch.put_cf(
            &cf_by_processor,
            keys::processor_key(&record.processor_id),
            id,
        );
        batch.put_cf(
            &cf_by_customer,
            keys::customer_child_key(&record.customer_id, id),
            [],
        );
        self.write(batch)?;

        Ok(record)
    }

    fn find_subscription_by_processor_id(
        &self,
        processor_id: &str,
    ) -> Result<Option<Subscription>> {
        match self.lookup_index(
            cf::SUBSCRIPTIONS_BY_PROCESSOR_ID,
            &keys::processor_key(processor_id),
        )? {
            Some(id) => self.get_subscription(&SubscriptionId::from_bytes(id)),
            None => Ok(None),
        }
    }

    fn list_subscriptions(&self, customer_id: &CustomerId) -> Result<Vec<Subscription>> {
        let mut ids = self.scan_customer_children(cf::SUBSCRIPTIONS_BY_CUSTOMER, customer_id)?;
        ids.reverse();

        let mut subscriptions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(sub) = self.get_subscription(&SubscriptionId::from_bytes(id))? {
                subscriptions.push(sub);
            }
        }
        Ok(subscriptions)
    }

    // =========================================================================
    // Charge Operations
    // =========================================================================

    fn upsert_charge(&self, charge: &Charge) -> Result<Charge> {
        let _guard = self.lock()?;

        let cf_records = self.cf(cf::CHARGES)?;
        let cf_by_processor = self.cf(cf::CHARGES_BY_PROCESSOR_ID)?;
        let cf_by_customer = self.cf(cf::CHARGES_BY_CUSTOMER)?;

        let mut record = charge.clone();
        record.updated_at = Utc::now();

        let mut batch = WriteBatch::default();
        if let Some(existing) = self.find_charge_by_processor_id(&charge.processor_id)? {
            record.id = existing.id;
            if existing.customer_id != record.customer_id {
                batch.delete_cf(
                    &cf_by_customer,
                    keys::customer_child_key(&existing.customer_id, existing.id.to_bytes()),
                );
            }
        }

        let id = record.id.to_bytes();
        batch.put_cf(&cf_records, id, Self::serialize(&record)?);
        batch.put_cf(
            &cf_by_processor,
            keys::processor_key(&record.processor_id),
            id,
        );
        batch.put_cf(
            &cf_by_customer,
            keys::customer_child_key(&record.customer_id, id),
            [],
        );
        self.write(batch)?;

        Ok(record)
    }

    fn find_charge_by_processor_id(&self, processor_id: &str) -> Result<Option<Charge>> {
        match self.lookup_index(cf::CHARGES_BY_PROCESSOR_ID, &keys::processor_key(processor_id))? {
            Some(id) => self.get_charge(&ChargeId::from_bytes(id)),
            None => Ok(None),
        }
    }

    fn list_charges(&self, customer_id: &CustomerId) -> Result<Vec<Charge>> {
        let mut ids = self.scan_customer_children(cf::CHARGES_BY_CUSTOMER, customer_id)?;
        ids.reverse();

        let mut charges = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(charge) = self.get_charge(&ChargeId::from_bytes(id))? {
                charges.push(charge);
            }
        }
        Ok(charges)
    }

    // =========================================================================
    // Webhook Event Operations
    // =========================================================================

    fn has_webhook_event(&self, event_id: &str) -> Result<bool> {
        Ok(self
            .get_raw(cf::WEBHOOK_EVENTS, &keys::webhook_event_key(event_id))?
            .is_some())
    }

    fn put_webhook_event(&self, event: &ProcessedEvent) -> Result<()> {
        let _guard = self.lock()?;

        if self.has_webhook_event(&event.event_id)? {
            return Err(StoreError::DuplicateEvent {
                event_id: event.event_id.clone(),
            });
        }

        let cf = self.cf(cf::WEBHOOK_EVENTS)?;
        self.db
            .put_cf(
                &cf,
                keys::webhook_event_key(&event.event_id),
                Self::serialize(event)?,
            )
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn delete_webhook_event(&self, event_id: &str) -> Result<bool> {
        let _guard = self.lock()?;

        if !self.has_webhook_event(event_id)? {
            return Ok(false);
        }

        let cf = self.cf(cf::WEBHOOK_EVENTS)?;
        self.db
            .delete_cf(&cf, keys::webhook_event_key(event_id))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }
}
