use ulid::Ulid;

use crate::error::BookingError;
use crate::model::*;

use super::GroomingStore;

impl GroomingStore {
    pub async fn get_user(&self, id: &str) -> Result<User, BookingError> {
        self.users
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| BookingError::UserNotFound(id.to_string()))
    }

    pub async fn get_groomer(&self, id: Ulid) -> Result<Groomer, BookingError> {
        let rs = self.get_state(&id).ok_or(BookingError::NotFound(id))?;
        let guard = rs.read().await;
        Ok(guard.groomer.clone())
    }

    pub async fn list_groomers(&self) -> Result<Vec<Groomer>, BookingError> {
        let mut groomers = Vec::with_capacity(self.groomers.len());
        for rs in self.all_states() {
            groomers.push(rs.read().await.groomer.clone());
        }
        groomers.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(groomers)
    }

    pub async fn get_service(&self, id: Ulid) -> Result<Service, BookingError> {
        self.services
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(BookingError::NotFound(id))
    }

    pub async fn list_services(&self) -> Result<Vec<Service>, BookingError> {
        let mut services: Vec<Service> = self.services.iter().map(|e| e.value().clone()).collect();
        services.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(services)
    }

    pub async fn get_pet(&self, id: Ulid) -> Result<Pet, BookingError> {
        self.pets
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(BookingError::NotFound(id))
    }

    pub async fn list_pets(&self, owner_id: &str) -> Result<Vec<Pet>, BookingError> {
        let mut pets: Vec<Pet> = self
            .pets
            .iter()
            .filter(|e| e.value().owner_id == owner_id)
            .map(|e| e.value().clone())
            .collect();
        pets.sort_by_key(|p| p.id);
        Ok(pets)
    }

    pub async fn get_reservation(&self, id: Ulid) -> Result<Reservation, BookingError> {
        let groomer_id = self
            .reservation_to_groomer
            .get(&id)
            .map(|e| *e.value())
            .ok_or(BookingError::NotFound(id))?;
        let rs = self
            .get_state(&groomer_id)
            .ok_or(BookingError::NotFound(groomer_id))?;
        let guard = rs.read().await;
        guard.find(&id).cloned().ok_or(BookingError::NotFound(id))
    }

    /// Every reservation (any status) made by `owner_id`, optionally for one pet, ordered by start.
    pub async fn list_reservations_for_owner(
        &self,
        owner_id: &str,
        pet_id: Option<Ulid>,
    ) -> Result<Vec<Reservation>, BookingError> {
        let mut out = Vec::new();
        for rs in self.all_states() {
            let guard = rs.read().await;
            out.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|r| r.owner_id == owner_id)
                    .filter(|r| pet_id.is_none_or(|p| r.pet_id == p))
                    .cloned(),
            );
        }
        out.sort_by_key(|r| (r.span.start, r.id));
        Ok(out)
    }

    pub async fn list_confirmed_reservations(
        &self,
        groomer_id: Ulid,
        window: Span,
    ) -> Result<Vec<Reservation>, BookingError> {
        let rs = self
            .get_state(&groomer_id)
            .ok_or(BookingError::NotFound(groomer_id))?;
        let guard = rs.read().await;
        Ok(guard.confirmed_in(&window))
    }
}
