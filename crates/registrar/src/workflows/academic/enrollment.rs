use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::domain::{
    CourseId, CourseRegistration, Enrollment, EnrollmentId, EnrollmentStatus, OfferingId,
    ProvisionedStudent, RegistrationId, RegistrationStatus, StudentProfile, StudentProfileId,
};
use super::identifiers::StudentIdentifierGenerator;
use super::prerequisites::PrerequisiteGraph;
use crate::clock::Clock;
use crate::integrations::{Notification, NotificationKind, Outbox, SideEffect};
use crate::store::{LockKey, Store};
use crate::workflows::admissions::domain::{ApplicationId, ApplicationStatus};
use crate::workflows::WorkflowError;

/// Student provisioning, enrollment status, and course registration.
pub struct EnrollmentWorkflow {
    store: Arc<Store>,
    prerequisites: Arc<PrerequisiteGraph>,
    identifiers: Arc<StudentIdentifierGenerator>,
    outbox: Outbox,
    clock: Arc<dyn Clock>,
}

impl EnrollmentWorkflow {
    pub fn new(
        store: Arc<Store>,
        prerequisites: Arc<PrerequisiteGraph>,
        identifiers: Arc<StudentIdentifierGenerator>,
        outbox: Outbox,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            prerequisites,
            identifiers,
            outbox,
            clock,
        }
    }

    /// Creates the student profile and first enrollment for an accepted
    /// application. Both rows land together or not at all.
    pub fn provision_student(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ProvisionedStudent, WorkflowError> {
        self.store
            .locks
            .with(LockKey::Application(application_id.clone()), || {
                let application = self.store.applications.require(application_id)?;
                if application.status != ApplicationStatus::Accepted {
                    return Err(WorkflowError::conflict(format!(
                        "application {application_id} is {}; only ACCEPTED applications can be provisioned",
                        application.status.label()
                    )));
                }

                let person_id = application.person_id.clone();
                self.store.locks.with(LockKey::Person(person_id.clone()), || {
                    if let Some(existing) = self
                        .store
                        .profiles
                        .find(|profile| profile.person_id == person_id)
                    {
                        return Err(WorkflowError::conflict(format!(
                            "person {person_id} is already provisioned as student {}",
                            existing.student_number
                        )));
                    }

                    let program = self.store.programs.require(&application.program_id)?;
                    let department = self.store.departments.require(&program.department_id)?;
                    let semester = self
                        .store
                        .semesters
                        .find(|semester| semester.is_active)
                        .ok_or_else(|| WorkflowError::conflict("No active semester found"))?;
                    let student_number = self.identifiers.generate(&department.code)?;

                    let now = self.clock.now();
                    let profile = StudentProfile {
                        id: StudentProfileId(self.store.profiles.next_key()),
                        person_id: person_id.clone(),
                        student_number,
                        status: EnrollmentStatus::Provisioned,
                        created_at: now,
                    };
                    let enrollment = Enrollment {
                        id: EnrollmentId(self.store.enrollments.next_key()),
                        profile_id: profile.id.clone(),
                        program_id: program.id.clone(),
                        batch_id: application.batch_id.clone(),
                        semester_id: semester.id.clone(),
                        status: EnrollmentStatus::Provisioned,
                        created_at: now,
                        updated_at: now,
                    };
                    self.store.profiles.insert(profile.id.clone(), profile.clone());
                    self.store
                        .enrollments
                        .insert(enrollment.id.clone(), enrollment.clone());

                    info!(
                        application_id = %application_id,
                        student_number = %profile.student_number,
                        enrollment_id = %enrollment.id,
                        semester = %semester.name,
                        "student provisioned"
                    );
                    Ok(ProvisionedStudent {
                        profile,
                        enrollment,
                    })
                })
            })
    }

    /// PROVISIONED → ACTIVE on both the enrollment and its profile. Calling it
    /// on an ACTIVE enrollment changes nothing.
    pub fn activate_enrollment(&self, id: &EnrollmentId) -> Result<Enrollment, WorkflowError> {
        let (enrollment, activated) =
            self.store.locks.with(LockKey::Enrollment(id.clone()), || {
                let enrollment = self.store.enrollments.require(id)?;
                match enrollment.status {
                    EnrollmentStatus::Active => {
                        debug!(enrollment_id = %id, "enrollment already active");
                        Ok((enrollment, false))
                    }
                    EnrollmentStatus::Provisioned => {
                        Ok((self.write_status(&enrollment, EnrollmentStatus::Active), true))
                    }
                    other => Err(WorkflowError::conflict(format!(
                        "enrollment {id} is {}; only PROVISIONED enrollments can be activated",
                        other.label()
                    ))),
                }
            })?;
        if activated {
            self.queue_activation_effects(&enrollment);
        }
        Ok(enrollment)
    }

    /// Activates the enrollment when it is still PROVISIONED and reports
    /// whether it did. Any other status is left alone.
    pub(crate) fn activate_if_provisioned(
        &self,
        id: &EnrollmentId,
    ) -> Result<bool, WorkflowError> {
        let activated = self.store.locks.with(LockKey::Enrollment(id.clone()), || {
            let enrollment = self.store.enrollments.require(id)?;
            if enrollment.status == EnrollmentStatus::Provisioned {
                Ok(Some(self.write_status(&enrollment, EnrollmentStatus::Active)))
            } else {
                Ok(None)
            }
        })?;
        Ok(match activated {
            Some(enrollment) => {
                self.queue_activation_effects(&enrollment);
                true
            }
            None => false,
        })
    }

    /// Sets the status on the enrollment and mirrors it onto the profile.
    pub fn update_status(
        &self,
        id: &EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<Enrollment, WorkflowError> {
        self.store.locks.with(LockKey::Enrollment(id.clone()), || {
            let enrollment = self.store.enrollments.require(id)?;
            self.store.profiles.require(&enrollment.profile_id)?;
            if enrollment.status == status {
                debug!(enrollment_id = %id, status = status.label(), "enrollment status unchanged");
                return Ok(enrollment);
            }
            Ok(self.write_status(&enrollment, status))
        })
    }

    /// Registers the enrollment into each offering in order.
    ///
    /// Registrations made before a failing offering stay committed; the
    /// failure is returned and the remaining offerings are not attempted.
    pub fn register_for_courses(
        &self,
        enrollment_id: &EnrollmentId,
        offering_ids: &[OfferingId],
    ) -> Result<Vec<CourseRegistration>, WorkflowError> {
        if offering_ids.is_empty() {
            return Err(WorkflowError::bad_request("at least one offering is required"));
        }

        self.store
            .locks
            .with(LockKey::Enrollment(enrollment_id.clone()), || {
                let enrollment = self.store.enrollments.require(enrollment_id)?;
                match enrollment.status {
                    EnrollmentStatus::Active => {}
                    EnrollmentStatus::OnHold | EnrollmentStatus::Withdrawn => {
                        return Err(WorkflowError::conflict(format!(
                            "enrollment {enrollment_id} is {} and cannot register for courses",
                            enrollment.status.label()
                        )))
                    }
                    EnrollmentStatus::Provisioned => {
                        return Err(WorkflowError::bad_request(format!(
                            "enrollment {enrollment_id} must be ACTIVE to register for courses"
                        )))
                    }
                }

                let mut registered = Vec::with_capacity(offering_ids.len());
                for offering_id in offering_ids {
                    let registration = self.register_one(enrollment_id, offering_id)?;
                    self.outbox
                        .enqueue(SideEffect::LmsSyncOffering(offering_id.clone()));
                    registered.push(registration);
                }
                Ok(registered)
            })
    }

    /// Runs with the enrollment lock held; takes the offering lock so the
    /// seat count and the insert cannot interleave with another registration.
    fn register_one(
        &self,
        enrollment_id: &EnrollmentId,
        offering_id: &OfferingId,
    ) -> Result<CourseRegistration, WorkflowError> {
        self.store
            .locks
            .with(LockKey::Offering(offering_id.clone()), || {
                let offering = self.store.offerings.require(offering_id)?;
                let course = self.store.courses.require(&offering.course_id)?;

                if self.store.registrations.any(|registration| {
                    &registration.enrollment_id == enrollment_id
                        && &registration.offering_id == offering_id
                }) {
                    return Err(WorkflowError::conflict(format!(
                        "enrollment {enrollment_id} is already registered for {} ({offering_id})",
                        course.code
                    )));
                }

                let taken = self.store.registrations.count(|registration| {
                    &registration.offering_id == offering_id
                        && registration.status == RegistrationStatus::Registered
                });
                if taken >= offering.capacity as usize {
                    return Err(WorkflowError::conflict(format!(
                        "course is full: {} has {taken}/{} seats taken",
                        course.code, offering.capacity
                    )));
                }

                if let Some(missing) = self.first_unmet_prerequisite(enrollment_id, &course.id) {
                    let prerequisite = self.store.courses.require(&missing)?;
                    return Err(WorkflowError::bad_request(format!(
                        "{} requires {} to be completed first",
                        course.code, prerequisite.code
                    )));
                }

                let now = self.clock.now();
                let registration = CourseRegistration {
                    id: RegistrationId(self.store.registrations.next_key()),
                    enrollment_id: enrollment_id.clone(),
                    offering_id: offering_id.clone(),
                    status: RegistrationStatus::Registered,
                    registered_at: now,
                    updated_at: now,
                };
                self.store
                    .registrations
                    .insert(registration.id.clone(), registration.clone());
                info!(
                    enrollment_id = %enrollment_id,
                    offering_id = %offering_id,
                    course = %course.code,
                    seats_taken = taken + 1,
                    capacity = offering.capacity,
                    "course registered"
                );
                Ok(registration)
            })
    }

    fn first_unmet_prerequisite(
        &self,
        enrollment_id: &EnrollmentId,
        course_id: &CourseId,
    ) -> Option<CourseId> {
        let prerequisites = self.prerequisites.prerequisites_of(course_id);
        if prerequisites.is_empty() {
            return None;
        }

        let completed: Vec<_> = self
            .store
            .registrations
            .filter(|registration| {
                &registration.enrollment_id == enrollment_id
                    && registration.status == RegistrationStatus::Completed
            })
            .into_iter()
            .filter_map(|registration| self.store.offerings.get(&registration.offering_id))
            .map(|offering| offering.course_id)
            .collect();

        prerequisites
            .into_iter()
            .find(|prerequisite| !completed.contains(prerequisite))
    }

    /// REGISTERED → DROPPED, freeing the seat.
    pub fn drop_registration(
        &self,
        id: &RegistrationId,
    ) -> Result<CourseRegistration, WorkflowError> {
        self.finish_registration(id, RegistrationStatus::Dropped)
    }

    /// REGISTERED → COMPLETED, which satisfies prerequisites for later
    /// registrations under the same enrollment.
    pub fn complete_registration(
        &self,
        id: &RegistrationId,
    ) -> Result<CourseRegistration, WorkflowError> {
        self.finish_registration(id, RegistrationStatus::Completed)
    }

    fn finish_registration(
        &self,
        id: &RegistrationId,
        target: RegistrationStatus,
    ) -> Result<CourseRegistration, WorkflowError> {
        let current = self.store.registrations.require(id)?;
        let locks = &self.store.locks;

        locks.with(LockKey::Enrollment(current.enrollment_id.clone()), || {
            locks.with(LockKey::Offering(current.offering_id.clone()), || {
                let mut registration = self.store.registrations.require(id)?;
                if registration.status != RegistrationStatus::Registered {
                    return Err(WorkflowError::conflict(format!(
                        "registration {id} is {}; only REGISTERED registrations can become {}",
                        registration.status.label(),
                        target.label()
                    )));
                }
                registration.status = target;
                registration.updated_at = self.clock.now();
                self.store
                    .registrations
                    .insert(id.clone(), registration.clone());
                info!(registration_id = %id, status = target.label(), "registration closed");
                Ok(registration)
            })
        })
    }

    pub fn registrations(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<Vec<CourseRegistration>, WorkflowError> {
        self.store.enrollments.require(enrollment_id)?;
        Ok(self
            .store
            .registrations
            .filter(|registration| &registration.enrollment_id == enrollment_id))
    }

    /// Seats currently held in an offering.
    pub fn seats_taken(&self, offering_id: &OfferingId) -> Result<usize, WorkflowError> {
        self.store.offerings.require(offering_id)?;
        Ok(self.store.registrations.count(|registration| {
            &registration.offering_id == offering_id
                && registration.status == RegistrationStatus::Registered
        }))
    }

    pub fn find_profile_or_fail(
        &self,
        id: &StudentProfileId,
    ) -> Result<StudentProfile, WorkflowError> {
        self.store.profiles.require(id)
    }

    pub fn find_enrollment_or_fail(&self, id: &EnrollmentId) -> Result<Enrollment, WorkflowError> {
        self.store.enrollments.require(id)
    }

    /// Writes `status` to the enrollment and its profile. Callers hold the
    /// enrollment lock and have already validated the transition.
    fn write_status(&self, enrollment: &Enrollment, status: EnrollmentStatus) -> Enrollment {
        let now = self.clock.now();
        let mut updated = enrollment.clone();
        updated.status = status;
        updated.updated_at = now;
        self.store
            .profiles
            .update(&enrollment.profile_id, |profile| profile.status = status);
        self.store
            .enrollments
            .insert(updated.id.clone(), updated.clone());
        info!(
            enrollment_id = %updated.id,
            from = enrollment.status.label(),
            to = status.label(),
            "enrollment status changed"
        );
        updated
    }

    fn queue_activation_effects(&self, enrollment: &Enrollment) {
        self.outbox
            .enqueue(SideEffect::LmsProvisionStudent(enrollment.id.clone()));

        let Some(profile) = self.store.profiles.get(&enrollment.profile_id) else {
            return;
        };
        let Some(person) = self.store.people.get(&profile.person_id) else {
            return;
        };
        let Some(email) = person.email.clone() else {
            debug!(enrollment_id = %enrollment.id, "no e-mail on file for activation notice");
            return;
        };

        let mut template_data = BTreeMap::new();
        template_data.insert("name".to_string(), person.full_name());
        template_data.insert("student_number".to_string(), profile.student_number);
        template_data.insert("enrollment_id".to_string(), enrollment.id.to_string());
        self.outbox.enqueue(SideEffect::Notify(Notification {
            kind: NotificationKind::EnrollmentActivated,
            recipient: email,
            template_data,
        }));
    }
}
