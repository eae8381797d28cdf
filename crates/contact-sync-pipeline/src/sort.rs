//! Contact ordering: pinned first, then most recent activity first.

use chrono::{DateTime, Utc};
use contact_types::Contact;
use std::cmp::Reverse;

type SortKey = (Reverse<bool>, Reverse<DateTime<Utc>>);

fn sort_key(contact: &Contact) -> SortKey {
    (Reverse(contact.pinned), Reverse(contact.effective_timestamp()))
}

/// Stable sort; contacts with equal rank keep their fetch order.
pub fn sort_contacts(contacts: Vec<Contact>) -> Vec<Contact> {
    let mut keyed: Vec<(SortKey, Contact)> = contacts
        .into_iter()
        .map(|contact| (sort_key(&contact), contact))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, contact)| contact).collect()
}
