use super::Engine;
use crate::error::{EngineError, EngineResult};
use crate::models::{Caller, EventView, Registrant, UserRegistration};
use crate::store::EventStore;

// Чтение без блокировок, статус считается заново на каждый запрос
impl<S: EventStore> Engine<S> {
    pub async fn list_events(&self) -> EngineResult<Vec<EventView>> {
        let events = self.store.list_events().await?;
        let now = self.clock.now();
        Ok(events.into_iter().map(|e| self.view_at(e, now)).collect())
    }

    pub async fn get_event(&self, event_id: i64) -> EngineResult<EventView> {
        let event = self
            .store
            .fetch_event(event_id)
            .await?
            .ok_or(EngineError::NotFound)?;
        Ok(self.view_at(event, self.clock.now()))
    }

    pub async fn my_registrations(&self, caller: Caller) -> EngineResult<Vec<UserRegistration>> {
        caller.require_participant()?;

        let rows = self.store.registrations_for_user(caller.user_id).await?;
        let now = self.clock.now();

        Ok(rows
            .into_iter()
            .map(|(registration, event)| UserRegistration {
                status: self.status_at(&event, now),
                event_id: event.id,
                title: event.title,
                venue: event.venue,
                speaker: event.speaker,
                starts_at: event.starts_at,
                seats_booked: registration.seats_booked,
                registered_at: registration.registered_at,
            })
            .collect())
    }

    /// Registrants of an event, visible only to its organizer.
    pub async fn event_registrations(&self, caller: Caller, event_id: i64) -> EngineResult<Vec<Registrant>> {
        caller.require_organizer()?;

        let event = self
            .store
            .fetch_event(event_id)
            .await?
            .ok_or(EngineError::NotFound)?;
        if event.organizer_id != caller.user_id {
            return Err(EngineError::Unauthorized);
        }

        Ok(self.store.registrants(event_id).await?)
    }
}
