use tracing::info;
use ulid::Ulid;

use crate::clock::parse_clock_time;
use crate::error::BookingError;
use crate::limits::*;
use crate::model::*;
use crate::store::DocumentStore;

use super::Scheduler;

fn require_text(field: &str, value: &str, max: usize) -> Result<(), BookingError> {
    if value.trim().is_empty() {
        return Err(BookingError::validation(format!("{field} is required")));
    }
    if value.len() > max {
        return Err(BookingError::validation(format!(
            "{field} exceeds {max} bytes"
        )));
    }
    Ok(())
}

fn validate_location(lat: f64, lng: f64) -> Result<GeoPoint, BookingError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(BookingError::validation(format!("latitude out of range: {lat}")));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(BookingError::validation(format!("longitude out of range: {lng}")));
    }
    Ok(GeoPoint { lat, lng })
}

impl<S: DocumentStore + ?Sized> Scheduler<S> {
    // ── Users ────────────────────────────────────────────

    /// Save the signed-in user's profile. New profiles get [`Role::User`];
    /// re-registering keeps whatever role is already stored.
    pub async fn register_user(&self, input: NewUser) -> Result<User, BookingError> {
        let id = self.require_user()?;
        require_text("name", &input.name, MAX_NAME_LEN)?;
        require_text("email", &input.email, MAX_NAME_LEN)?;
        if !input.email.contains('@') {
            return Err(BookingError::validation(format!("invalid email: {}", input.email)));
        }

        let role = match self.store.get_user(&id).await {
            Ok(existing) => existing.role,
            Err(BookingError::UserNotFound(_)) => Role::default(),
            Err(e) => return Err(e),
        };
        let user = User {
            id,
            name: input.name.trim().to_string(),
            email: input.email.trim().to_string(),
            role,
        };
        self.store.put_user(user.clone()).await?;
        info!("user {} saved as {}", user.id, user.role);
        Ok(user)
    }

    /// Admin only. Change the role of an existing profile.
    pub async fn grant_role(&self, user_id: &str, role: Role) -> Result<User, BookingError> {
        let admin = self.require_admin().await?;
        let mut user = self.store.get_user(user_id).await?;
        user.role = role;
        self.store.put_user(user.clone()).await?;
        info!("{} set role of {} to {role}", admin.id, user.id);
        Ok(user)
    }

    // ── Groomers ─────────────────────────────────────────

    /// Admin only.
    pub async fn register_groomer(&self, input: NewGroomer) -> Result<Groomer, BookingError> {
        self.require_admin().await?;
        require_text("name", &input.name, MAX_NAME_LEN)?;
        require_text("address", &input.address, MAX_TEXT_LEN)?;
        require_text("description", &input.description, MAX_TEXT_LEN)?;
        require_text("photo", &input.photo_url, MAX_TEXT_LEN)?;
        let location = validate_location(input.lat, input.lng)?;

        let opening_hour = parse_clock_time(input.opening_hour.trim())?;
        let closing_hour = parse_clock_time(input.closing_hour.trim())?;
        if opening_hour >= closing_hour {
            return Err(BookingError::InvalidSchedule {
                opening: opening_hour,
                closing: closing_hour,
            });
        }

        let groomer = Groomer {
            id: Ulid::new(),
            name: input.name.trim().to_string(),
            address: input.address.trim().to_string(),
            description: input.description,
            location,
            photo_url: input.photo_url,
            opening_hour,
            closing_hour,
        };
        self.store.insert_groomer(groomer.clone()).await?;
        info!(
            "groomer {} registered: {} ({opening_hour}-{closing_hour})",
            groomer.id, groomer.name
        );
        Ok(groomer)
    }

    pub async fn get_groomer(&self, id: Ulid) -> Result<Groomer, BookingError> {
        self.store.get_groomer(id).await
    }

    pub async fn list_groomers(&self) -> Result<Vec<Groomer>, BookingError> {
        self.store.list_groomers().await
    }

    // ── Services ─────────────────────────────────────────

    /// Admin only.
    pub async fn add_service(&self, input: NewService) -> Result<Service, BookingError> {
        self.require_admin().await?;
        require_text("service name", &input.name, MAX_NAME_LEN)?;
        if input.duration_minutes == 0 {
            return Err(BookingError::validation("service duration must be positive"));
        }
        if i64::from(input.duration_minutes) > MAX_RESERVATION_MINUTES {
            return Err(BookingError::LimitExceeded("service longer than a day"));
        }

        let service = Service {
            id: Ulid::new(),
            name: input.name.trim().to_string(),
            duration_minutes: input.duration_minutes,
            price_cents: input.price_cents,
        };
        self.store.insert_service(service.clone()).await?;
        info!("service {} added: {} ({} min)", service.id, service.name, service.duration_minutes);
        Ok(service)
    }

    pub async fn list_services(&self) -> Result<Vec<Service>, BookingError> {
        self.store.list_services().await
    }

    // ── Pets ─────────────────────────────────────────────

    /// Register a pet under the signed-in user.
    pub async fn register_pet(&self, input: NewPet) -> Result<Pet, BookingError> {
        let owner_id = self.require_user()?;
        require_text("pet name", &input.name, MAX_NAME_LEN)?;
        require_text("breed", &input.breed, MAX_NAME_LEN)?;
        if input.notes.as_ref().is_some_and(|n| n.len() > MAX_TEXT_LEN) {
            return Err(BookingError::validation(format!(
                "notes exceed {MAX_TEXT_LEN} bytes"
            )));
        }

        let pet = Pet {
            id: Ulid::new(),
            owner_id,
            name: input.name.trim().to_string(),
            breed: input.breed.trim().to_string(),
            notes: input.notes.filter(|n| !n.trim().is_empty()),
            photo_url: input.photo_url,
        };
        self.store.insert_pet(pet.clone()).await?;
        info!("pet {} registered for {}", pet.id, pet.owner_id);
        Ok(pet)
    }

    pub async fn pets_of_current_user(&self) -> Result<Vec<Pet>, BookingError> {
        let owner_id = self.require_user()?;
        self.store.list_pets(&owner_id).await
    }

    /// The signed-in user's reservations, any status, optionally for one pet.
    pub async fn reservations_of_current_user(
        &self,
        pet_id: Option<Ulid>,
    ) -> Result<Vec<Reservation>, BookingError> {
        let owner_id = self.require_user()?;
        self.store.list_reservations_for_owner(&owner_id, pet_id).await
    }
}
